use probcount::CardinalityEstimator;

fn main() {
    let mut estimator1 = CardinalityEstimator::new(10).unwrap();
    for letter in 'a'..='z' {
        estimator1.update(&letter.to_string());
    }
    println!("estimator1 estimate = {:.2}", estimator1.estimate());

    let mut estimator2 = CardinalityEstimator::new(10).unwrap();
    for i in 0..1000 {
        estimator2.update(&format!("user-{i}"));
    }
    println!("estimator2 estimate = {:.2}", estimator2.estimate());

    estimator1.merge(&estimator2).unwrap();
    println!("merged estimate = {:.2}", estimator1.estimate());
    println!("{estimator1:?}");
}
