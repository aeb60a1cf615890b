//! Interrupt service cost with sixteen enabled channels

use criterion::{criterion_group, criterion_main, Criterion};
use softpwm_mux::{Pwm, PwmConfig};
use softpwm_sim::{SimBoard, SimCounter, SimPins};
use std::hint::black_box;

fn loaded_pwm(board: &SimBoard) -> Pwm<SimCounter, SimPins, 16> {
    let pwm = Pwm::new();
    let config = PwmConfig::builder().max_channels(16).build();
    pwm.initialize(board.counter(), board.pins(), config);

    for pin in 0..16u8 {
        pwm.register_pin(pin).unwrap();
        let period = 500 + u32::from(pin) * 137;
        pwm.set_period_and_duty(pin, period, 0.1 + f32::from(pin) * 0.05)
            .unwrap();
    }
    pwm.enable_all().unwrap();
    pwm.start().unwrap();
    pwm
}

fn bench_interrupt_service(c: &mut Criterion) {
    let board = SimBoard::default();
    let pwm = loaded_pwm(&board);

    c.bench_function("interrupt_service_16ch", |b| {
        b.iter(|| {
            pwm.on_interrupt();
            black_box(board.cycles());
        });
    });
}

fn bench_set_duty(c: &mut Criterion) {
    let board = SimBoard::default();
    let pwm = loaded_pwm(&board);
    let mut duty = 0.0f32;

    c.bench_function("set_duty", |b| {
        b.iter(|| {
            duty = (duty + 0.013) % 1.0;
            black_box(pwm.set_duty(7, black_box(duty))).ok();
        });
    });
}

fn bench_simulated_10ms(c: &mut Criterion) {
    c.bench_function("simulated_10ms_16ch", |b| {
        b.iter(|| {
            let board = SimBoard::default();
            let pwm = loaded_pwm(&board);
            board.run_for_micros(10_000, || pwm.on_interrupt());
            black_box(board.edges(0).len());
        });
    });
}

criterion_group!(
    benches,
    bench_interrupt_service,
    bench_set_duty,
    bench_simulated_10ms,
);

criterion_main!(benches);
