use rust_decimal::{Decimal, RoundingStrategy};

/// Mean of `ratings` rounded half-up to 2 decimal places; zero when there are none.
pub fn average_rating(ratings: &[Decimal]) -> Decimal {
    if ratings.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = ratings.iter().copied().sum();
    (sum / Decimal::from(ratings.len() as u64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn average_of_four_five_three() {
        assert_eq!(average_rating(&[dec!(4), dec!(5), dec!(3)]), dec!(4.00));
    }

    #[test]
    fn average_rounds_half_up() {
        // 33 / 8 = 4.125 -> 4.13
        let mut ratings = vec![dec!(4); 7];
        ratings.push(dec!(5));
        assert_eq!(average_rating(&ratings), dec!(4.13));
        assert_eq!(average_rating(&[dec!(5), dec!(4), dec!(4)]), dec!(4.33));
    }

    #[test]
    fn no_reviews_is_zero() {
        assert_eq!(average_rating(&[]), Decimal::ZERO);
    }
}
