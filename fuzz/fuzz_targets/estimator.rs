#![no_main]

use libfuzzer_sys::fuzz_target;
use probcount::CardinalityEstimator;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let precision = 4 + data[0] % 17;
    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut estimator1 = CardinalityEstimator::new(precision).unwrap();
    for chunk in first_half.chunks(4) {
        estimator1.insert(&chunk);
        assert!(estimator1.estimate() > 0.0);
    }

    let mut estimator2 = CardinalityEstimator::new(precision).unwrap();
    for chunk in second_half.chunks(4) {
        estimator2.update(&String::from_utf8_lossy(chunk));
        assert!(estimator2.estimate() > 0.0);
    }

    estimator1.merge(&estimator2).unwrap();
    assert!(estimator1.estimate() >= 0.0);
    assert!(estimator1.size_of() > 0);
});
