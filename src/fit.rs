use ndarray::{arr2, Array2};
use num_traits::Float;

use crate::dataset::{Dataset, Domain, Point};
use crate::derived::Measurement;
use crate::{Error, Result};

/// A straight line `y = a + b x` obtained by weighted least squares over `domain`
#[derive(Clone, Debug)]
pub struct FittedLine<E> {
    intercept: E,
    slope: E,
    /// Parameter covariance, rows and columns ordered `(a, b)`
    covariance: Array2<E>,
    domain: Domain<E>,
    chi_square: E,
    num_points: usize,
}

impl<E: Float> FittedLine<E> {
    pub const fn intercept(&self) -> E {
        self.intercept
    }

    pub const fn slope(&self) -> E {
        self.slope
    }

    /// `[a, b]`
    pub const fn parameters(&self) -> [E; 2] {
        [self.intercept, self.slope]
    }

    pub fn sigma_intercept(&self) -> E {
        self.covariance[[0, 0]].sqrt()
    }

    pub fn sigma_slope(&self) -> E {
        self.covariance[[1, 1]].sqrt()
    }

    /// `[sigma_a, sigma_b]`, or `None` for a two point fit: the line passes through both
    /// points exactly and its parameter errors are not constrained by the data
    pub fn standard_errors(&self) -> Option<[E; 2]> {
        match self.degrees_of_freedom() {
            0 => None,
            _ => Some([self.sigma_intercept(), self.sigma_slope()]),
        }
    }

    pub fn covariance(&self) -> &Array2<E> {
        &self.covariance
    }

    pub const fn domain(&self) -> Domain<E> {
        self.domain
    }

    pub const fn chi_square(&self) -> E {
        self.chi_square
    }

    /// Number of points that fell inside the domain
    pub const fn num_points(&self) -> usize {
        self.num_points
    }

    pub const fn degrees_of_freedom(&self) -> usize {
        self.num_points - 2
    }

    /// `None` for a two point fit, which has no residual degrees of freedom
    pub fn reduced_chi_square(&self) -> Option<E> {
        match self.degrees_of_freedom() {
            0 => None,
            ndf => E::from(ndf).map(|ndf| self.chi_square / ndf),
        }
    }

    pub fn evaluate(&self, x: E) -> E {
        self.intercept + self.slope * x
    }

    /// Evaluate the line at `x` with the first order uncertainty of the fitted parameters,
    /// correlation included.
    pub fn evaluate_with_uncertainty(&self, x: E) -> Measurement<E> {
        let cov = &self.covariance;
        let two = E::one() + E::one();
        let variance = cov[[0, 0]] + x * x * cov[[1, 1]] + two * x * cov[[0, 1]];
        Measurement {
            value: self.evaluate(x),
            uncertainty: variance.max(E::zero()).sqrt(),
        }
    }
}

fn weight<E: Float>(point: &Point<E>) -> E {
    // Exact ordinates would have infinite weight, they count as unit weight instead.
    if point.sigma_y > E::zero() {
        point.sigma_y.powi(-2)
    } else {
        E::one()
    }
}

struct WeightedSums<E> {
    s: E,
    sx: E,
    sy: E,
    sxx: E,
}

impl<E: Float> WeightedSums<E> {
    fn accumulate(points: &[Point<E>]) -> Self {
        points.iter().fold(
            Self {
                s: E::zero(),
                sx: E::zero(),
                sy: E::zero(),
                sxx: E::zero(),
            },
            |sums, point| {
                let w = weight(point);
                Self {
                    s: sums.s + w,
                    sx: sums.sx + w * point.x,
                    sy: sums.sy + w * point.y,
                    sxx: sums.sxx + w * point.x * point.x,
                }
            },
        )
    }
}

/// The matrix of the normal equations, `[[S, Sx], [Sx, Sxx]]`, for the points of `dataset`
/// lying in `domain`
pub fn normal_matrix<E: Float>(dataset: &Dataset<E>, domain: &Domain<E>) -> Array2<E> {
    let sums = WeightedSums::accumulate(dataset.within(domain).points());
    arr2(&[[sums.s, sums.sx], [sums.sx, sums.sxx]])
}

/// Fit `y = a + b x` to the points of `dataset` whose abscissa lies in `domain`
///
/// Each point is weighted by `1 / sigma_y^2`, a point with `sigma_y == 0` takes unit weight.
/// The errors are treated as absolute: the parameter covariance is the inverse of the normal
/// matrix, without rescaling by the reduced chi-square.
///
/// # Errors
/// - [`Error::InsufficientPoints`] if fewer than two points lie in `domain`
/// - [`Error::Singular`] if the selected points do not span a range of abscissae
/// - [`Error::NonFinite`] if a selected point carries a NaN or infinite value
pub fn fit<E: Float>(dataset: &Dataset<E>, domain: Domain<E>) -> Result<FittedLine<E>> {
    let selected = dataset.within(&domain);
    let points = selected.points();
    if points.len() < 2 {
        return Err(Error::InsufficientPoints {
            found: points.len(),
        });
    }

    let sums = WeightedSums::accumulate(points);
    let x_mean = sums.sx / sums.s;
    let y_mean = sums.sy / sums.s;

    // Centred sums keep duplicated abscissae at an exact zero spread
    let (sxx_centred, sxy_centred) = points
        .iter()
        .fold((E::zero(), E::zero()), |(sxx, sxy), point| {
            let w = weight(point);
            let dx = point.x - x_mean;
            (sxx + w * dx * dx, sxy + w * dx * (point.y - y_mean))
        });

    if !(sxx_centred > E::epsilon() * sums.sxx) {
        return Err(Error::Singular);
    }

    let slope = sxy_centred / sxx_centred;
    let intercept = y_mean - slope * x_mean;

    // Inverse of [[S, Sx], [Sx, Sxx]], whose determinant is S * sxx_centred
    let determinant = sums.s * sxx_centred;
    let covariance =
        arr2(&[[sums.sxx, -sums.sx], [-sums.sx, sums.s]]).mapv(|element| element / determinant);

    let chi_square = points.iter().fold(E::zero(), |chi_square, point| {
        let residual = point.y - (intercept + slope * point.x);
        chi_square + weight(point) * residual * residual
    });

    let finite = intercept.is_finite()
        && slope.is_finite()
        && chi_square.is_finite()
        && covariance.iter().all(|element| element.is_finite());
    if !finite {
        return Err(Error::NonFinite {
            quantity: "linear fit",
        });
    }

    Ok(FittedLine {
        intercept,
        slope,
        covariance,
        domain,
        chi_square,
        num_points: points.len(),
    })
}

#[cfg(test)]
mod test {
    use ndarray::Array2;
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    use super::{fit, normal_matrix};
    use crate::dataset::{Dataset, Domain, Point};
    use crate::Error;

    fn dataset_a() -> Dataset<f64> {
        Dataset::new(
            "A",
            vec![
                Point::new(1., 5., 0.1, 0.2),
                Point::new(2., 8., 0.1, 0.2),
                Point::new(3., 11., 0.1, 0.2),
            ],
        )
    }

    #[test]
    fn exact_data_is_reproduced() {
        let line = fit(&dataset_a(), Domain::new(1., 3.)).unwrap();

        approx::assert_relative_eq!(line.intercept(), 2.0, max_relative = 1e-12);
        approx::assert_relative_eq!(line.slope(), 3.0, max_relative = 1e-12);
        approx::assert_relative_eq!(line.evaluate(2.), 8.0, max_relative = 1e-12);
        assert_eq!(line.num_points(), 3);
        assert_eq!(line.degrees_of_freedom(), 1);
    }

    #[test]
    fn two_points_give_the_line_through_them() {
        let dataset = Dataset::new(
            "",
            vec![Point::new(0.5, 1.25, 0., 0.3), Point::new(4.5, -2.75, 0., 0.1)],
        );
        let line = fit(&dataset, Domain::new(0., 5.)).unwrap();

        approx::assert_relative_eq!(line.slope(), -1.0, max_relative = 1e-12);
        approx::assert_relative_eq!(line.intercept(), 1.75, max_relative = 1e-12);
        approx::assert_abs_diff_eq!(line.chi_square(), 0.0, epsilon = 1e-20);
        assert_eq!(line.degrees_of_freedom(), 0);
        assert_eq!(line.reduced_chi_square(), None);
        assert_eq!(line.standard_errors(), None);
    }

    #[test]
    fn three_points_have_standard_errors() {
        let line = fit(&dataset_a(), Domain::new(1., 3.)).unwrap();
        let [sigma_a, sigma_b] = line.standard_errors().unwrap();
        approx::assert_relative_eq!(sigma_a, line.sigma_intercept());
        approx::assert_relative_eq!(sigma_b, line.sigma_slope());
        assert!(sigma_b > 0.0);
    }

    #[test]
    fn a_nan_ordinate_is_not_fitted() {
        let mut points = dataset_a().points().to_vec();
        points[1].y = f64::NAN;

        let result = fit(&Dataset::new("", points), Domain::new(1., 3.));

        assert!(matches!(
            result,
            Err(Error::NonFinite {
                quantity: "linear fit"
            })
        ));
    }

    #[test]
    fn exact_line_is_recovered_whatever_the_errors() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        let points = (0..20_i32)
            .map(|n| {
                let x = f64::from(n) * 0.25;
                Point::new(x, 2. + 3. * x, rng.gen(), rng.gen_range(0.0..2.0))
            })
            .collect();
        let dataset = Dataset::new("", points);
        let line = fit(&dataset, Domain::new(0., 5.)).unwrap();

        approx::assert_relative_eq!(line.intercept(), 2.0, max_relative = 1e-10);
        approx::assert_relative_eq!(line.slope(), 3.0, max_relative = 1e-10);
    }

    #[test]
    fn points_outside_the_domain_are_ignored() {
        let mut points = dataset_a().points().to_vec();
        points.push(Point::new(10., -40., 0.1, 0.2));
        let line = fit(&Dataset::new("", points), Domain::new(1., 3.)).unwrap();

        approx::assert_relative_eq!(line.slope(), 3.0, max_relative = 1e-12);
        assert_eq!(line.domain(), Domain::new(1., 3.));
    }

    #[test]
    fn unweighted_points_count_with_unit_weight() {
        let dataset = Dataset::new(
            "",
            vec![
                Point::new(0., 0., 0., 0.),
                Point::new(1., 1., 0., 1.),
                Point::new(2., 0., 0., 0.),
            ],
        );
        let line = fit(&dataset, Domain::new(0., 2.)).unwrap();

        // Equal weights, symmetric about x = 1
        approx::assert_abs_diff_eq!(line.slope(), 0.0, epsilon = 1e-12);
        approx::assert_relative_eq!(line.intercept(), 1. / 3., max_relative = 1e-12);
    }

    #[test]
    fn standard_errors_follow_the_absolute_weights() {
        let line = fit(&dataset_a(), Domain::new(1., 3.)).unwrap();

        // S = 75, Sx = 150, Sxx = 350, det = 3750
        let sigma_a = (350. / 3750.0_f64).sqrt();
        let sigma_b = (75. / 3750.0_f64).sqrt();
        approx::assert_relative_eq!(line.sigma_intercept(), sigma_a, max_relative = 1e-12);
        approx::assert_relative_eq!(line.sigma_slope(), sigma_b, max_relative = 1e-12);
        approx::assert_relative_eq!(line.covariance()[[0, 1]], -0.04, max_relative = 1e-12);
    }

    #[test]
    fn covariance_inverts_the_normal_matrix() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let points = (0..30)
            .map(|_| {
                Point::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    0.,
                    rng.gen_range(0.1..1.0),
                )
            })
            .collect();
        let dataset = Dataset::new("", points);
        let domain = Domain::new(-3., 4.);

        let line = fit(&dataset, domain).unwrap();
        let product = line.covariance().dot(&normal_matrix(&dataset, &domain));

        let identity: Array2<f64> = Array2::eye(2);
        for (calculated, expected) in product.iter().zip(identity.iter()) {
            approx::assert_abs_diff_eq!(calculated, expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn too_few_points_are_rejected() {
        let result = fit(&dataset_a(), Domain::new(2.5, 10.));
        assert!(matches!(result, Err(Error::InsufficientPoints { found: 1 })));

        let result = fit(&dataset_a(), Domain::new(3., 1.));
        assert!(matches!(result, Err(Error::InsufficientPoints { found: 0 })));
    }

    #[test]
    fn duplicated_abscissae_are_singular() {
        let dataset = Dataset::new(
            "",
            vec![
                Point::new(2., 1., 0., 0.1),
                Point::new(2., 3., 0., 0.2),
                Point::new(2., 2., 0., 0.),
            ],
        );

        assert!(matches!(fit(&dataset, Domain::new(2., 2.)), Err(Error::Singular)));
        assert!(matches!(fit(&dataset, Domain::new(0., 4.)), Err(Error::Singular)));
    }

    #[test]
    fn evaluation_uncertainty_is_smallest_at_the_weighted_centre() {
        let line = fit(&dataset_a(), Domain::new(1., 3.)).unwrap();

        let centre = line.evaluate_with_uncertainty(2.);
        let edge = line.evaluate_with_uncertainty(3.);

        approx::assert_relative_eq!(centre.value, 8.0, max_relative = 1e-12);
        // At the weighted mean the variance reduces to 1 / S
        let expected = (1. / 75.0_f64).sqrt();
        approx::assert_relative_eq!(centre.uncertainty, expected, max_relative = 1e-10);
        assert!(edge.uncertainty > centre.uncertainty);
    }
}
