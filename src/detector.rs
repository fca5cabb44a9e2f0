//! The market-condition detector: a pure function mapping oracle output to a
//! categorical condition plus confidence, per spec section 4.5. Decision
//! order is first-match-wins; property 7 in spec section 8 pins this down.

use crate::model::state::MarketCondition;
use crate::oracle::OracleSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct DetectorThresholds {
    pub pump_percent: f64,
    pub dump_percent: f64,
    pub range_percent: f64,
    pub range_volatility: f64,
    pub extreme_volatility: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        DetectorThresholds {
            pump_percent: 10.0,
            dump_percent: -10.0,
            range_percent: 3.0,
            range_volatility: 3.0,
            extreme_volatility: 15.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorResult {
    pub condition: MarketCondition,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Maps an oracle snapshot to a market condition. Rules are evaluated in the
/// order given by spec section 4.5; the first rule that matches wins, even if
/// a later rule would also match (property 7).
pub fn detect(snapshot: &OracleSnapshot, thresholds: &DetectorThresholds) -> DetectorResult {
    let volatility = snapshot.volatility.unwrap_or(0.0);
    let rsi = snapshot.rsi14.unwrap_or(50.0);
    let change = snapshot.price_change_24h_percent;

    if volatility > thresholds.extreme_volatility {
        let confidence = (60.0 + (volatility - thresholds.extreme_volatility) * 2.0).min(100.0);
        return DetectorResult {
            condition: MarketCondition::ExtremeVolatility,
            confidence,
            reasons: vec![format!(
                "Volatility {volatility:.1}% exceeds extreme threshold {:.1}%",
                thresholds.extreme_volatility
            )],
        };
    }

    if change > thresholds.pump_percent || rsi > thresholds.rsi_overbought {
        let mut confidence: f64 = 50.0;
        let mut reasons = Vec::new();
        if change > thresholds.pump_percent {
            let excess = (change - thresholds.pump_percent).max(0.0);
            confidence += excess.min(30.0);
            reasons.push(format!("Price up {change:.1}% in 24h"));
        }
        if rsi > thresholds.rsi_overbought {
            let excess = (rsi - thresholds.rsi_overbought).max(0.0);
            confidence += excess.min(30.0);
            reasons.push(format!("RSI {rsi:.1} is overbought"));
        }
        return DetectorResult {
            condition: MarketCondition::Pump,
            confidence: confidence.min(100.0),
            reasons,
        };
    }

    if change < thresholds.dump_percent || rsi < thresholds.rsi_oversold {
        let mut confidence: f64 = 50.0;
        let mut reasons = Vec::new();
        if change < thresholds.dump_percent {
            let excess = (thresholds.dump_percent - change).max(0.0);
            confidence += excess.min(30.0);
            reasons.push(format!("Price down {change:.1}% in 24h"));
        }
        if rsi < thresholds.rsi_oversold {
            let excess = (thresholds.rsi_oversold - rsi).max(0.0);
            confidence += excess.min(30.0);
            reasons.push(format!("RSI {rsi:.1} is oversold"));
        }
        return DetectorResult {
            condition: MarketCondition::Dump,
            confidence: confidence.min(100.0),
            reasons,
        };
    }

    if change.abs() < thresholds.range_percent && volatility < thresholds.range_volatility {
        return DetectorResult {
            condition: MarketCondition::Ranging,
            confidence: 70.0,
            reasons: vec![format!(
                "Price change {change:.1}% and volatility {volatility:.1}% both within range band"
            )],
        };
    }

    DetectorResult {
        condition: MarketCondition::Normal,
        confidence: 60.0,
        reasons: vec!["No condition rule matched".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(change: f64, rsi: f64, volatility: f64) -> OracleSnapshot {
        OracleSnapshot {
            price_usd: 1.0,
            price_change_24h_percent: change,
            volume_24h_usd: 0.0,
            liquidity_usd: 0.0,
            short_ema: None,
            long_ema: None,
            rsi14: Some(rsi),
            volatility: Some(volatility),
        }
    }

    #[test]
    fn s4_detector_pump() {
        let result = detect(&snapshot(12.0, 68.0, 5.0), &DetectorThresholds::default());
        assert_eq!(result.condition, MarketCondition::Pump);
        assert!(result.reasons.iter().any(|r| r.contains("Price up 12.0%")));
        assert!(result.confidence >= 50.0 + (12.0 - 10.0) * 2.0);
    }

    #[test]
    fn extreme_volatility_wins_over_pump() {
        let result = detect(&snapshot(20.0, 90.0, 16.0), &DetectorThresholds::default());
        assert_eq!(result.condition, MarketCondition::ExtremeVolatility);
    }

    #[test]
    fn dump_detected_on_rsi_alone() {
        let result = detect(&snapshot(0.0, 20.0, 1.0), &DetectorThresholds::default());
        assert_eq!(result.condition, MarketCondition::Dump);
    }

    #[test]
    fn ranging_when_flat_and_calm() {
        let result = detect(&snapshot(1.0, 50.0, 1.0), &DetectorThresholds::default());
        assert_eq!(result.condition, MarketCondition::Ranging);
        assert_eq!(result.confidence, 70.0);
    }

    #[test]
    fn normal_otherwise() {
        let result = detect(&snapshot(5.0, 50.0, 5.0), &DetectorThresholds::default());
        assert_eq!(result.condition, MarketCondition::Normal);
        assert_eq!(result.confidence, 60.0);
    }
}
