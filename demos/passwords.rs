use probcount::classifier::{classify, Candidate};
use probcount::MembershipFilter;

fn main() {
    let mut filter = MembershipFilter::new(1000, 3).unwrap();
    for known in ["password123", "admin", "letmein", "qwerty"] {
        filter.insert(known).unwrap();
    }

    let candidates: Vec<Candidate> = vec![
        "password123".into(),
        "securePass!".into(),
        "admin".into(),
        "guest".into(),
        "".into(),
        "   ".into(),
        Candidate::Absent,
        12345.into(),
    ];

    for (item, status) in classify(&mut filter, candidates, false) {
        println!("'{item}' - {status}");
    }
    println!("{filter:?}");
}
