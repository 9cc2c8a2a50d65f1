use dpnoise::{
    smallest_discrete_laplace_noise_with, smallest_gaussian_noise, smallest_laplace_noise_with,
    BasicCompositionOracle, PrivacyBudget,
};
use proptest::prelude::*;

fn budget(epsilon: f64, delta: f64) -> PrivacyBudget {
    PrivacyBudget::new(epsilon, delta).expect("budget")
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    #[test]
    fn basic_laplace_scale_has_closed_form(
        eps in 0.1f64..10.0,
        sensitivity in 0.1f64..10.0,
        num_queries in 1usize..50,
    ) {
        let scale = smallest_laplace_noise_with(
            &BasicCompositionOracle,
            budget(eps, 0.0),
            num_queries,
            sensitivity,
        )
        .expect("calibration")
        .value()
        .expect("feasible");
        let expected = num_queries as f64 * sensitivity / eps;
        prop_assert!((scale - expected).abs() <= 1e-8 * expected.max(1.0));
        prop_assert!(num_queries as f64 * sensitivity / scale <= eps + 1e-12);
    }

    #[test]
    fn basic_discrete_laplace_parameter_has_closed_form(
        eps in 0.1f64..10.0,
        sensitivity in 1u32..20,
        num_queries in 1usize..50,
    ) {
        let sensitivity = f64::from(sensitivity);
        let a = smallest_discrete_laplace_noise_with(
            &BasicCompositionOracle,
            budget(eps, 0.0),
            num_queries,
            sensitivity,
        )
        .expect("calibration")
        .value()
        .expect("feasible");
        let expected = eps / (num_queries as f64 * sensitivity);
        prop_assert!(a <= expected + 1e-12);
        prop_assert!(expected - a <= 1e-8);
    }

    #[test]
    fn gaussian_noise_is_idempotent_and_monotone(
        eps in 0.1f64..5.0,
        delta_exp in 3i32..10,
        sensitivity in 0.1f64..10.0,
        num_queries in 1usize..30,
    ) {
        let target = budget(eps, 10f64.powi(-delta_exp));
        let first = smallest_gaussian_noise(target, num_queries, sensitivity).expect("first");
        let again = smallest_gaussian_noise(target, num_queries, sensitivity).expect("again");
        prop_assert_eq!(first, again);
        let more = smallest_gaussian_noise(target, num_queries + 1, sensitivity * 1.5)
            .expect("more");
        let base = first.value().expect("feasible");
        prop_assert!(more.value().expect("feasible") >= base - 1e-9);
    }
}
