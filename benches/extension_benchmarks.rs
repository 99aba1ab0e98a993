use criterion::{Criterion, black_box, criterion_group, criterion_main};
use moq_playtime::consumer::{ClockCalibrator, DrainPolicy, PlaybackScheduler, SchedulerConfig};
use moq_playtime::protocol::{ExtensionHeader, ExtensionHeaders, playtime};
use moq_playtime::PlaytimeConfig;

const MS: i64 = 1_000_000;
const NOW: i64 = 1_700_000_000_000 * MS;

fn extension_benchmark(c: &mut Criterion) {
    // A block as a publisher would send it: one unrelated header plus the stamp
    let mut headers = ExtensionHeaders::new();
    headers.push(ExtensionHeader::varint(0x3C, 42).unwrap());
    headers.set_target_playtime(NOW + 150 * MS);
    let encoded = headers.encode().unwrap();

    c.bench_function("extension_decode", |b| {
        b.iter(|| ExtensionHeaders::decode(black_box(&encoded)).unwrap())
    });

    c.bench_function("extension_encode", |b| {
        b.iter(|| black_box(&headers).encode().unwrap())
    });

    c.bench_function("target_playtime_find", |b| {
        let decoded = ExtensionHeaders::decode(&encoded).unwrap();
        b.iter(|| playtime::find(black_box(&decoded)).unwrap())
    });
}

fn calibrator_benchmark(c: &mut Criterion) {
    let config = PlaytimeConfig::default().calibrator();

    c.bench_function("calibrator_observe", |b| {
        let mut calibrator = ClockCalibrator::new(config.clone());
        let mut arrival = NOW;
        b.iter(|| {
            arrival += 20 * MS;
            calibrator
                .observe(black_box(arrival + 150 * MS), black_box(arrival))
                .unwrap()
        })
    });
}

fn scheduler_benchmark(c: &mut Criterion) {
    let config = SchedulerConfig {
        jitter_buffer_target_ns: 0,
        lateness_drop_threshold_ns: 100 * MS,
        drain_policy: DrainPolicy::HonorDeadlines,
    };

    c.bench_function("scheduler_enqueue_release", |b| {
        let mut scheduler = PlaybackScheduler::new(config.clone());
        let mut now = NOW;
        b.iter(|| {
            scheduler.enqueue(black_box(0u32), now, now).unwrap();
            let released = scheduler.poll(now);
            now += 20 * MS;
            released
        })
    });
}

criterion_group!(
    benches,
    extension_benchmark,
    calibrator_benchmark,
    scheduler_benchmark
);
criterion_main!(benches);
