use dpnoise::{inverse_monotone_function, SearchBounds};

fn main() {
    // Where does exp(-x) drop to 1e-6?
    let bounds = SearchBounds::unbounded_above(0.0).expect("bounds");
    let outcome =
        inverse_monotone_function(|x| Ok((-x).exp()), 1e-6, &bounds).expect("monotone search");
    println!("exp(-x) = 1e-6 at x = {:?}", outcome.value());

    let bounds = SearchBounds::new(0.0, 4.0).expect("bounds");
    let outcome = inverse_monotone_function(|x| Ok(-x), -5.0, &bounds).expect("monotone search");
    println!("-x = -5 on [0, 4]: {outcome:?}");
}
