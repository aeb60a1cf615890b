//! Simulated board tests

use softpwm_core::{Level, OutputSink, NO_PIN};
use softpwm_sim::{BoardConfig, SimBoard};
use softpwm_timer::CompareCounter;

#[test]
fn test_counter_counts_only_when_clocked() {
    let board = SimBoard::default();
    let mut counter = board.counter();

    board.run_for(1_000, || {});
    assert_eq!(counter.count(), 0);

    // clk/8
    counter.start(1);
    board.run_for(800, || {});
    // the read itself costs 16 cycles, two ticks at /8
    assert_eq!(counter.count(), 102);
    assert!(board.is_counting());

    counter.stop();
    let frozen = counter.count();
    board.run_for(10_000, || {});
    assert_eq!(counter.count(), frozen);
}

#[test]
fn test_compare_match_calls_isr() {
    let board = SimBoard::default();
    let mut counter = board.counter();
    counter.set_compare(1_000);
    counter.set_match_interrupt(true);
    counter.start(0);

    let mut hits = Vec::new();
    board.run_for(3_000, || hits.push(board.cycles()));
    assert_eq!(hits, [1_000]);
}

#[test]
fn test_disabled_match_is_not_delivered() {
    let board = SimBoard::default();
    let mut counter = board.counter();
    counter.set_compare(100);
    counter.start(0);

    let mut hits = 0;
    board.run_for(1_000, || hits += 1);
    assert_eq!(hits, 0);
}

#[test]
fn test_counter_wraps() {
    let board = SimBoard::new(BoardConfig {
        read_cost: 0,
        ..BoardConfig::default()
    });
    let mut counter = board.counter();
    counter.start(0);
    board.run_for(65_536 + 10, || {});
    assert_eq!(counter.count(), 10);
}

#[test]
fn test_pins_record_edges() {
    let board = SimBoard::default();
    let mut pins = board.pins();

    assert_eq!(pins.resolve(19), Some(19));
    assert_eq!(pins.resolve(20), None);
    assert_eq!(pins.resolve(NO_PIN), None);

    pins.configure_output(5);
    assert!(board.is_output(5));
    pins.write(5, Level::High);
    pins.write(5, Level::High);
    board.run_for(160, || {});
    pins.write(5, Level::Low);

    let edges = board.edges(5);
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].level, Level::High);
    assert_eq!(edges[1].cycle - edges[0].cycle, 160);
    assert_eq!(pins.read(5), Level::Low);
    assert!(board.edges(4).is_empty());
}
