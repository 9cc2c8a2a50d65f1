use dpnoise::{
    smallest_discrete_laplace_noise, smallest_gaussian_noise, smallest_laplace_noise,
    PrivacyBudget,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");

    let num_queries = 20;
    let sensitivity = 1.0;
    let budget = PrivacyBudget::new(1.0, 1e-4).expect("budget");

    let laplace = smallest_laplace_noise(budget, num_queries, sensitivity).expect("laplace");
    let discrete = smallest_discrete_laplace_noise(budget, num_queries, sensitivity)
        .expect("discrete laplace");
    let gaussian = smallest_gaussian_noise(budget, num_queries, sensitivity).expect("gaussian");

    println!(
        "budget (eps={}, delta={}) over {num_queries} queries:",
        budget.epsilon(),
        budget.delta()
    );
    println!("  laplace scale:              {:?}", laplace.value());
    println!("  discrete laplace parameter: {:?}", discrete.value());
    println!("  gaussian std:               {:?}", gaussian.value());
}
