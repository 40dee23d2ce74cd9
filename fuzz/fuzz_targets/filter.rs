#![no_main]

use libfuzzer_sys::fuzz_target;
use probcount::{Error, MembershipFilter};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let size = usize::from(data[0]) * 64 + 1;
    let num_probes = usize::from(data[1] % 8) + 1;
    let mut filter = MembershipFilter::new(size, num_probes).unwrap();

    let text = String::from_utf8_lossy(&data[2..]);
    for item in text.split('\n') {
        match filter.insert(item) {
            Ok(()) => assert!(filter.query(item).unwrap()),
            Err(Error::TypeInvalid(_)) => assert!(item.is_empty()),
            Err(err) => panic!("unexpected error {err}"),
        }
        assert!(filter.positions(item).map_or(true, |p| p.iter().all(|&i| i < size)));
    }
    assert!(filter.bits_set() <= size);
});
