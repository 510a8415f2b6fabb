//! Price statistics and technical indicators over daily closes

use crate::error::{MarketError, Result};
use ta::Next;
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};

/// Trading days in a year, used to annualise volatility
pub const TRADING_DAYS: usize = 252;

/// Last value of an RSI over `period`; `None` until enough closes exist
pub fn rsi(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() <= period {
        return Ok(None);
    }
    let mut rsi =
        RelativeStrengthIndex::new(period).map_err(|e| MarketError::IndicatorError(e.to_string()))?;
    Ok(closes.iter().map(|&close| rsi.next(close)).last())
}

/// Last value of a simple moving average; `None` until `period` closes exist
pub fn sma(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() < period {
        return Ok(None);
    }
    let mut sma =
        SimpleMovingAverage::new(period).map_err(|e| MarketError::IndicatorError(e.to_string()))?;
    Ok(closes.iter().map(|&close| sma.next(close)).last())
}

/// Annualised standard deviation of daily log returns
pub fn annualised_volatility(closes: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * (TRADING_DAYS as f64).sqrt())
}

/// Simple return from the first to the last close, as a fraction
pub fn period_return(closes: &[f64]) -> Option<f64> {
    match (closes.first(), closes.last()) {
        (Some(&first), Some(&last)) if first > 0.0 && closes.len() > 1 => Some(last / first - 1.0),
        _ => None,
    }
}

/// Interpretation of an RSI reading
pub fn interpret_rsi(value: f64) -> &'static str {
    if value >= 70.0 {
        "Overbought"
    } else if value <= 30.0 {
        "Oversold"
    } else {
        "Neutral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_sma() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&closes, 5).unwrap(), Some(3.0));
        assert_eq!(sma(&closes, 6).unwrap(), None);
    }

    #[test]
    fn test_rsi_of_steady_rally_is_overbought() {
        let value = rsi(&rising(60), 14).unwrap().unwrap();
        assert!(value > 70.0, "rsi {value}");
        assert_eq!(interpret_rsi(value), "Overbought");
        assert_eq!(rsi(&rising(10), 14).unwrap(), None);
    }

    #[test]
    fn test_volatility() {
        assert_eq!(annualised_volatility(&[100.0; 30]), Some(0.0));
        assert!(annualised_volatility(&[100.0, 101.0]).is_none());

        let choppy: Vec<f64> = (0..50)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        assert!(annualised_volatility(&choppy).unwrap() > 0.2);
    }

    #[test]
    fn test_period_return() {
        let value = period_return(&[100.0, 90.0, 125.0]).unwrap();
        assert!((value - 0.25).abs() < 1e-12);
        assert_eq!(period_return(&[100.0]), None);
        assert_eq!(period_return(&[]), None);
    }
}
