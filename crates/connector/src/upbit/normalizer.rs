//! Upbit DTO -> canonical message conversion.
//!
//! Validation mirrors the upstream schema: required fields must be present,
//! prices strictly positive, sizes and volumes non-negative.

use rust_decimal::Decimal;

use crate::error::NormalizeError;
use crate::message::{
    CanonicalMessage, DataType, Metadata, OrderBookPayload, OrderBookUnit, Payload,
    TickerPayload, TradePayload,
};
use crate::upbit::messages::{UpbitOrderBook, UpbitTicker, UpbitTrade};

/// Source name stamped on every message converted from this feed
pub const UPBIT_SOURCE_NAME: &str = "UPBIT";

/// Stateless converter from Upbit DTOs to [`CanonicalMessage`].
#[derive(Debug, Clone)]
pub struct UpbitNormalizer {
    source_name: String,
}

impl Default for UpbitNormalizer {
    fn default() -> Self {
        Self::new(UPBIT_SOURCE_NAME)
    }
}

impl UpbitNormalizer {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn ticker(&self, dto: UpbitTicker) -> Result<CanonicalMessage, NormalizeError> {
        let market_code = market_code(dto.cd)?;
        let trade_price = required("tp", dto.tp)?;
        positive("tp", trade_price)?;
        let timestamp = positive_int("tms", dto.tms)?;

        for (field, value) in [("op", dto.op), ("hp", dto.hp), ("lp", dto.lp), ("pcp", dto.pcp)] {
            if let Some(v) = value {
                positive(field, v)?;
            }
        }
        for (field, value) in [("tv", dto.tv), ("atp24h", dto.atp24h), ("atv24h", dto.atv24h)] {
            if let Some(v) = value {
                non_negative(field, v)?;
            }
        }

        Ok(self.wrap(
            DataType::Ticker,
            Payload::Ticker(TickerPayload {
                market_code,
                trade_price,
                trade_volume: dto.tv,
                opening_price: dto.op,
                high_price: dto.hp,
                low_price: dto.lp,
                prev_closing_price: dto.pcp,
                acc_trade_price_24h: dto.atp24h,
                acc_trade_volume_24h: dto.atv24h,
                timestamp,
            }),
        ))
    }

    pub fn trade(&self, dto: UpbitTrade) -> Result<CanonicalMessage, NormalizeError> {
        let market_code = market_code(dto.cd)?;
        let trade_price = required("tp", dto.tp)?;
        positive("tp", trade_price)?;
        // zero volume counts as absent
        let trade_volume = match dto.tv {
            Some(tv) if tv.is_zero() => return Err(NormalizeError::MissingField("tv")),
            tv => required("tv", tv)?,
        };
        positive("tv", trade_volume)?;

        let ask_bid = match dto.ab {
            Some(ab) if !ab.trim().is_empty() => ab,
            _ => return Err(NormalizeError::MissingField("ab")),
        };
        if ask_bid != "ASK" && ask_bid != "BID" {
            return Err(invalid("ab", format!("expected ASK or BID, got {}", ask_bid)));
        }

        let sequential_id = positive_int("sid", dto.sid)?;
        let timestamp = positive_int("tms", dto.tms)?;
        let trade_timestamp = positive_int("ttms", dto.ttms)?;

        if let Some(td) = dto.td.as_deref() {
            if !matches_digits(td, "dddd-dd-dd") {
                return Err(invalid("td", format!("expected yyyy-MM-dd, got {}", td)));
            }
        }
        if let Some(ttm) = dto.ttm.as_deref() {
            if !matches_digits(ttm, "dd:dd:dd") {
                return Err(invalid("ttm", format!("expected HH:mm:ss, got {}", ttm)));
            }
        }
        if let Some(c) = dto.c.as_deref() {
            if !matches!(c, "RISE" | "EVEN" | "FALL") {
                return Err(invalid("c", format!("expected RISE, EVEN or FALL, got {}", c)));
            }
        }
        for (field, value) in [("pcp", dto.pcp), ("bap", dto.bap), ("bbp", dto.bbp)] {
            if let Some(v) = value {
                positive(field, v)?;
            }
        }
        for (field, value) in [("cp", dto.cp), ("bas", dto.bas), ("bbs", dto.bbs)] {
            if let Some(v) = value {
                non_negative(field, v)?;
            }
        }

        Ok(self.wrap(
            DataType::Trade,
            Payload::Trade(TradePayload {
                market_code,
                timestamp,
                trade_date: dto.td,
                trade_time: dto.ttm,
                trade_timestamp,
                trade_price,
                trade_volume,
                ask_bid,
                prev_closing_price: dto.pcp,
                change: dto.c,
                change_price: dto.cp,
                sequential_id,
                best_ask_price: dto.bap,
                best_ask_size: dto.bas,
                best_bid_price: dto.bbp,
                best_bid_size: dto.bbs,
                stream_type: dto.st,
            }),
        ))
    }

    pub fn orderbook(&self, dto: UpbitOrderBook) -> Result<CanonicalMessage, NormalizeError> {
        let market_code = market_code(dto.cd)?;
        let units = match dto.obu {
            Some(units) if !units.is_empty() => units,
            Some(_) => return Err(invalid("obu", "must contain at least one unit".to_string())),
            None => return Err(NormalizeError::MissingField("obu")),
        };
        let timestamp = positive_int("tms", dto.tms)?;

        for (field, value) in [("tas", dto.tas), ("tbs", dto.tbs)] {
            if let Some(v) = value {
                non_negative(field, v)?;
            }
        }

        let orderbook_units = units
            .into_iter()
            .map(|unit| {
                let ask_price = required("obu.ap", unit.ap)?;
                let ask_size = required("obu.as", unit.ask_size)?;
                let bid_price = required("obu.bp", unit.bp)?;
                let bid_size = required("obu.bs", unit.bs)?;
                positive("obu.ap", ask_price)?;
                non_negative("obu.as", ask_size)?;
                positive("obu.bp", bid_price)?;
                non_negative("obu.bs", bid_size)?;
                Ok(OrderBookUnit {
                    ask_price,
                    ask_size,
                    bid_price,
                    bid_size,
                })
            })
            .collect::<Result<Vec<_>, NormalizeError>>()?;

        Ok(self.wrap(
            DataType::OrderBook,
            Payload::OrderBook(OrderBookPayload {
                market_code,
                timestamp,
                total_ask_size: dto.tas,
                total_bid_size: dto.tbs,
                orderbook_units,
            }),
        ))
    }

    fn wrap(&self, data_type: DataType, payload: Payload) -> CanonicalMessage {
        CanonicalMessage {
            metadata: Metadata::new(self.source_name.clone(), data_type),
            payload,
        }
    }
}

fn invalid(field: &'static str, reason: String) -> NormalizeError {
    NormalizeError::InvalidField { field, reason }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, NormalizeError> {
    value.ok_or(NormalizeError::MissingField(field))
}

fn positive(field: &'static str, value: Decimal) -> Result<(), NormalizeError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(invalid(field, format!("must be greater than 0, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: Decimal) -> Result<(), NormalizeError> {
    if value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(invalid(field, format!("must not be negative, got {}", value)))
    }
}

fn positive_int(field: &'static str, value: Option<i64>) -> Result<i64, NormalizeError> {
    match value {
        Some(v) if v > 0 => Ok(v),
        Some(v) => Err(invalid(field, format!("must be greater than 0, got {}", v))),
        None => Err(NormalizeError::MissingField(field)),
    }
}

/// Market codes look like `KRW-BTC`: 3-4 uppercase letters, a dash, 2-10 uppercase
/// letters or digits.
fn market_code(cd: Option<String>) -> Result<String, NormalizeError> {
    let code = match cd {
        Some(code) if !code.trim().is_empty() => code,
        _ => return Err(NormalizeError::MissingField("cd")),
    };

    let valid = match code.split_once('-') {
        Some((quote, base)) => {
            (3..=4).contains(&quote.len())
                && quote.chars().all(|c| c.is_ascii_uppercase())
                && (2..=10).contains(&base.len())
                && base
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        }
        None => false,
    };
    if !valid {
        return Err(invalid("cd", format!("malformed market code {}", code)));
    }
    Ok(code)
}

/// `d` in the shape matches an ASCII digit; any other char must match literally.
fn matches_digits(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value.chars().zip(shape.chars()).all(|(v, s)| match s {
            'd' => v.is_ascii_digit(),
            _ => v == s,
        })
}
