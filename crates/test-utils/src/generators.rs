//! Synthetic ensemble samples with predictable values.

use ensemble_common::EnsembleSample;

/// Member names in upstream order: the deterministic run first, then
/// perturbed runs `P1..`.
pub fn member_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| if i == 0 { "Main".to_string() } else { format!("P{}", i) })
        .collect()
}

/// Sample where member `m` at time index `t` has value `m * 10 + t`.
///
/// Makes it easy to check indexing: every member is strictly above every
/// lower-numbered member at each time.
pub fn create_indexed_sample(members: usize, times: usize) -> EnsembleSample {
    let mut values = Vec::with_capacity(members * times);
    for m in 0..members {
        for t in 0..times {
            values.push((m * 10 + t) as f64);
        }
    }
    EnsembleSample::new(member_names(members), hour_axis(times, 1), values)
        .expect("generator produces a consistent shape")
}

/// Temperature-like sample: a diurnal cycle around 10°C with a per-member
/// spread that widens with lead time.
pub fn create_temperature_sample(members: usize, times: usize) -> EnsembleSample {
    let mut values = Vec::with_capacity(members * times);
    for m in 0..members {
        // Center members on 0 and spread them symmetrically.
        let offset = m as f64 - (members as f64 - 1.0) / 2.0;
        for t in 0..times {
            let hour = t as f64;
            let diurnal = 6.0 * (std::f64::consts::TAU * (hour - 9.0) / 24.0).sin();
            let spread = 0.1 * offset * (1.0 + hour / 12.0);
            values.push(10.0 + diurnal + spread);
        }
    }
    EnsembleSample::new(member_names(members), hour_axis(times, 1), values)
        .expect("generator produces a consistent shape")
}

/// Precipitation-like sample: mostly dry, with rain in the second half for
/// the upper half of the members.
pub fn create_precipitation_sample(members: usize, times: usize) -> EnsembleSample {
    let mut values = Vec::with_capacity(members * times);
    for m in 0..members {
        for t in 0..times {
            let wet = m >= members / 2 && t >= times / 2;
            values.push(if wet { 0.5 * (m - members / 2 + 1) as f64 } else { 0.0 });
        }
    }
    EnsembleSample::new(member_names(members), hour_axis(times, 1), values)
        .expect("generator produces a consistent shape")
}

/// `count` hour offsets starting at zero, `step` hours apart.
pub fn hour_axis(count: usize, step: i64) -> Vec<i64> {
    (0..count as i64).map(|i| i * step).collect()
}
