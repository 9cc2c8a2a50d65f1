use dpnoise::{
    smallest_laplace_noise_with, BasicCompositionOracle, OracleConfig, PldOracleConfig,
    PrivacyBudget,
};

fn main() {
    let budget = PrivacyBudget::new(1.0, 1e-5).expect("budget");

    let basic = smallest_laplace_noise_with(&BasicCompositionOracle, budget, 50, 1.0)
        .expect("basic composition");
    println!("basic composition scale: {:?}", basic.value());

    for interval in [1e-2, 1e-3, 1e-4] {
        let oracle = PldOracleConfig::new(interval)
            .create_oracle()
            .expect("valid config");
        let tight = smallest_laplace_noise_with(&oracle, budget, 50, 1.0).expect("pld");
        println!("pld scale (interval {interval:e}): {:?}", tight.value());
    }
}
