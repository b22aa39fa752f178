//! Search criteria, marketplace offers, and offer selection.

use thiserror::Error;

/// Default lower price bound in dollars per hour. Filters out degenerate free
/// listings.
pub const DEFAULT_MIN_HOURLY_PRICE: f64 = 0.1;

/// Constraints used to query the marketplace.
///
/// Built once per workflow run and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCriteria {
    /// Minimum number of effective CPU cores.
    pub min_cpu_cores: u32,
    /// Minimum amount of RAM in gigabytes.
    pub min_ram_gb: f64,
    /// Minimum download bandwidth in Mb/s.
    pub min_download_mbps: Option<u32>,
    /// Upper bound on the total hourly price.
    pub max_hourly_price: Option<f64>,
    /// Lower bound on the hourly price.
    pub min_hourly_price: f64,
    /// CUDA version the machine must report.
    pub required_cuda_version: Option<f64>,
}

impl SearchCriteria {
    /// Starts a builder seeded with the marketplace defaults.
    #[must_use]
    pub fn builder() -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::new()
    }

    /// Checks the criteria are complete and internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError`] naming the offending field.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.min_cpu_cores == 0 {
            return Err(CriteriaError::OutOfRange("min_cpu_cores"));
        }
        if !self.min_ram_gb.is_finite() || self.min_ram_gb <= 0.0 {
            return Err(CriteriaError::OutOfRange("min_ram_gb"));
        }
        if !self.min_hourly_price.is_finite() || self.min_hourly_price < 0.0 {
            return Err(CriteriaError::OutOfRange("min_hourly_price"));
        }
        if let Some(max) = self.max_hourly_price
            && (!max.is_finite() || max < self.min_hourly_price)
        {
            return Err(CriteriaError::InvertedPriceRange {
                min: self.min_hourly_price,
                max,
            });
        }
        if self
            .required_cuda_version
            .is_some_and(|cuda| !cuda.is_finite() || cuda <= 0.0)
        {
            return Err(CriteriaError::OutOfRange("required_cuda_version"));
        }
        Ok(())
    }
}

/// Builder for [`SearchCriteria`].
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
}

impl Default for SearchCriteriaBuilder {
    fn default() -> Self {
        Self {
            criteria: SearchCriteria {
                min_cpu_cores: 1,
                min_ram_gb: 1.0,
                min_download_mbps: None,
                max_hourly_price: None,
                min_hourly_price: DEFAULT_MIN_HOURLY_PRICE,
                required_cuda_version: None,
            },
        }
    }
}

impl SearchCriteriaBuilder {
    /// Creates a builder with one core, 1 GB of RAM, and the default price
    /// floor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum number of effective CPU cores.
    #[must_use]
    pub const fn min_cpu_cores(mut self, value: u32) -> Self {
        self.criteria.min_cpu_cores = value;
        self
    }

    /// Sets the minimum RAM in gigabytes.
    #[must_use]
    pub const fn min_ram_gb(mut self, value: f64) -> Self {
        self.criteria.min_ram_gb = value;
        self
    }

    /// Sets the minimum download bandwidth.
    #[must_use]
    pub const fn min_download_mbps(mut self, value: Option<u32>) -> Self {
        self.criteria.min_download_mbps = value;
        self
    }

    /// Sets the maximum hourly price.
    #[must_use]
    pub const fn max_hourly_price(mut self, value: Option<f64>) -> Self {
        self.criteria.max_hourly_price = value;
        self
    }

    /// Sets the minimum hourly price.
    #[must_use]
    pub const fn min_hourly_price(mut self, value: f64) -> Self {
        self.criteria.min_hourly_price = value;
        self
    }

    /// Sets the required CUDA version.
    #[must_use]
    pub const fn required_cuda_version(mut self, value: Option<f64>) -> Self {
        self.criteria.required_cuda_version = value;
        self
    }

    /// Validates and returns the criteria.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError`] when a bound is out of range.
    pub fn build(self) -> Result<SearchCriteria, CriteriaError> {
        self.criteria.validate()?;
        Ok(self.criteria)
    }
}

/// Errors raised when search criteria are incomplete or contradictory.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CriteriaError {
    /// A numeric bound is zero, negative, or not finite.
    #[error("search criterion {0} is out of range")]
    OutOfRange(&'static str),
    /// The price floor exceeds the price ceiling.
    #[error("minimum hourly price {min} exceeds maximum {max}")]
    InvertedPriceRange {
        /// Configured floor.
        min: f64,
        /// Configured ceiling.
        max: f64,
    },
}

/// A rentable machine advertised by the marketplace at query time.
#[derive(Clone, Debug, PartialEq)]
pub struct Offer {
    /// Marketplace identifier of the offer.
    pub id: u64,
    /// CPU model name.
    pub cpu_name: String,
    /// CPU cores allotted to the rental; fractional on shared hosts.
    pub cpu_cores_effective: f64,
    /// CPU cores on the whole host.
    pub cpu_cores_total: u32,
    /// Host RAM in megabytes.
    pub ram_mb: f64,
    /// Hourly price without storage.
    pub hourly_price_base: f64,
    /// Hourly price including storage.
    pub hourly_price_total: f64,
    /// Download bandwidth in Mb/s.
    pub download_mbps: f64,
    /// Highest CUDA version the host driver supports.
    pub max_cuda_version: f64,
}

/// Raised when there is no offer to choose from.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("no offer matched the search criteria")]
pub struct NoOfferFound;

/// Picks the cheapest offer by total hourly price.
///
/// Offers with equal prices keep their input order, so the first one seen
/// wins.
///
/// # Errors
///
/// Returns [`NoOfferFound`] when `offers` is empty.
pub fn select_best(offers: &[Offer]) -> Result<&Offer, NoOfferFound> {
    offers
        .iter()
        .reduce(|best, candidate| {
            if candidate
                .hourly_price_total
                .total_cmp(&best.hourly_price_total)
                .is_lt()
            {
                candidate
            } else {
                best
            }
        })
        .ok_or(NoOfferFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn offer(id: u64, price: f64) -> Offer {
        Offer {
            id,
            cpu_name: String::from("AMD EPYC 7302"),
            cpu_cores_effective: 8.0,
            cpu_cores_total: 32,
            ram_mb: 64_000.0,
            hourly_price_base: price,
            hourly_price_total: price,
            download_mbps: 500.0,
            max_cuda_version: 12.2,
        }
    }

    #[rstest]
    fn select_best_picks_cheapest_total_price() {
        let offers = vec![offer(1, 0.25), offer(2, 0.18), offer(3, 0.4)];
        let best = select_best(&offers).expect("an offer should be selected");
        assert_eq!(best.id, 2);
        assert!(
            offers
                .iter()
                .all(|other| best.hourly_price_total <= other.hourly_price_total)
        );
    }

    #[rstest]
    fn select_best_keeps_first_seen_on_ties() {
        let offers = vec![offer(5, 0.3), offer(9, 0.2), offer(4, 0.2)];
        let best = select_best(&offers).expect("an offer should be selected");
        assert_eq!(best.id, 9);
    }

    #[rstest]
    fn select_best_rejects_empty_input() {
        assert_eq!(select_best(&[]), Err(NoOfferFound));
    }

    #[rstest]
    fn builder_applies_defaults() {
        let criteria = SearchCriteria::builder().build().expect("defaults are valid");
        assert_eq!(criteria.min_cpu_cores, 1);
        assert_eq!(criteria.min_hourly_price, DEFAULT_MIN_HOURLY_PRICE);
        assert_eq!(criteria.max_hourly_price, None);
    }

    #[rstest]
    #[case::zero_cores(SearchCriteria::builder().min_cpu_cores(0), "min_cpu_cores")]
    #[case::zero_ram(SearchCriteria::builder().min_ram_gb(0.0), "min_ram_gb")]
    #[case::negative_floor(SearchCriteria::builder().min_hourly_price(-1.0), "min_hourly_price")]
    #[case::bad_cuda(
        SearchCriteria::builder().required_cuda_version(Some(f64::NAN)),
        "required_cuda_version"
    )]
    fn builder_rejects_out_of_range(
        #[case] builder: SearchCriteriaBuilder,
        #[case] field: &'static str,
    ) {
        assert_eq!(builder.build(), Err(CriteriaError::OutOfRange(field)));
    }

    #[rstest]
    fn builder_rejects_inverted_price_range() {
        let err = SearchCriteria::builder()
            .min_hourly_price(0.5)
            .max_hourly_price(Some(0.3))
            .build()
            .expect_err("inverted range should be rejected");
        assert!(matches!(err, CriteriaError::InvertedPriceRange { .. }));
    }
}
