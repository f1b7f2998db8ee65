//! Criterion benchmarks for the per-gesture overlay paths: shape boards on
//! piece selection, highlighted footprints on hover, relay frame handling.
//!
//! Run with:
//!     cargo bench --bench shape_overlay

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use polyomino_session::engine::models::*;
use polyomino_session::engine::plugin::RulesEngine;
use polyomino_session::games::catalog::{piece_set, STANDARD_SHAPES};
use polyomino_session::games::sandbox::SandboxEngine;
use polyomino_session::session::geometry::to_shape_board;
use polyomino_session::session::grid::BoardGrid;
use polyomino_session::session::{ChannelMessage, Session};

fn pieces() -> Vec<Piece> {
    piece_set(&[0], &STANDARD_SHAPES)
}

fn bench_to_shape_board(c: &mut Criterion) {
    let pieces = pieces();
    let mut group = c.benchmark_group("to_shape_board");

    for dimension in [14usize, 20] {
        group.bench_with_input(
            BenchmarkId::new("all_pieces", dimension),
            &dimension,
            |b, &d| {
                b.iter(|| pieces.iter().map(|p| to_shape_board(p, d)).count());
            },
        );
    }

    group.finish();
}

fn bench_hover_sweep(c: &mut Criterion) {
    let engine = SandboxEngine::new(20, &["A".to_string(), "B".to_string()]);
    let mut session = Session::from_snapshot(engine.snapshot(), false).unwrap();
    // Largest footprint in the catalog: the X pentomino.
    session.select_piece(18);

    let mut group = c.benchmark_group("highlighted_positions");

    // Pointer dragged over every cell of the board.
    group.bench_function("full_sweep_20", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for row in 0..20 {
                for col in 0..20 {
                    session.hover_enter(Position::new(row, col));
                    total += session.highlighted_positions().len();
                }
            }
            total
        });
    });

    group.finish();
}

fn bench_cell_views(c: &mut Criterion) {
    let cells: Vec<Position> = (0..20).map(|i| Position::new(i, (i * 7) % 20)).collect();
    let grid = BoardGrid::new(Board::empty(20).with_cells(&cells, Some(2)));

    c.bench_function("cell_views_20", |b| {
        b.iter(|| grid.cell_views().filter(|(_, v)| v.css_class(false, Some(0)).len() > 20).count());
    });
}

fn bench_relay_frame(c: &mut Criterion) {
    let mut engine = SandboxEngine::new(20, &["A".to_string(), "B".to_string()]);
    let snapshot = engine.snapshot();
    let accepted = engine
        .place(&PlacementRequest {
            player: 0,
            piece: 10,
            position: Position::new(0, 0),
        })
        .unwrap();
    let frame = ChannelMessage::turn(accepted.turn, accepted.board).encode().unwrap();

    c.bench_function("apply_relay_frame", |b| {
        b.iter_batched(
            || Session::from_snapshot(snapshot.clone(), true).unwrap(),
            |mut session| session.apply_relay_frame(&frame),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_to_shape_board,
    bench_hover_sweep,
    bench_cell_views,
    bench_relay_frame
);
criterion_main!(benches);
