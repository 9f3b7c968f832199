//! Composite Simpson quadrature.
//!
//! Detection functions are smooth on `[0, w]`, so a fixed even number of
//! panels is accurate to well below the optimiser tolerance.

/// Default number of Simpson panels (must be even).
pub const SIMPSON_PANELS: usize = 256;

/// Integrate `f` over `[a, b]` with `panels` Simpson panels.
///
/// `panels` is rounded up to the next even number. Returns `0.0` for an empty
/// interval.
pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, panels: usize) -> f64 {
    if b <= a {
        return 0.0;
    }
    let n = (panels.max(2) + 1) & !1;
    let h = (b - a) / n as f64;

    let mut acc = f(a) + f(b);
    for i in 1..n {
        let x = a + h * i as f64;
        acc += if i % 2 == 1 { 4.0 * f(x) } else { 2.0 * f(x) };
    }
    acc * h / 3.0
}
