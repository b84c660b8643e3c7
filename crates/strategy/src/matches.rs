use common::CandleMatches;

/// Classify one candle against the SMA it opened into.
///
/// * green above: bullish close and the low stays above the SMA
/// * red below: bearish close and the high stays below the SMA
///
/// Any missing or non-finite input yields no match. Doji candles
/// (`close == open`) never match.
pub fn evaluate_matches(
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    sma: Option<f64>,
) -> CandleMatches {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (Some(open), Some(high), Some(low), Some(close), Some(sma)) = (
        finite(open),
        finite(high),
        finite(low),
        finite(close),
        finite(sma),
    ) else {
        return CandleMatches::default();
    };

    CandleMatches {
        green_above: close > open && low > sma,
        red_below: close < open && high < sma,
    }
}
