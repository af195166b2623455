use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::domain::{RateSourceTag, Strategy};
use crate::error::DomainError;

#[derive(Debug, FromRow)]
pub struct StrategyModel {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub rate_bps: i32,
    pub risk_level: i16,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub active: bool,
    pub rate_source: String,
    pub rate_updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewStrategyModel {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub rate_bps: i32,
    pub risk_level: i16,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub active: bool,
    pub rate_source: String,
    pub rate_updated_at: DateTime<Utc>,
}

impl TryFrom<StrategyModel> for Strategy {
    type Error = DomainError;

    fn try_from(row: StrategyModel) -> Result<Self, Self::Error> {
        let rate_bps = u32::try_from(row.rate_bps).map_err(|_| DomainError::OutOfRange {
            field: "rate_bps",
            detail: format!("{} is negative", row.rate_bps),
        })?;
        let risk_level = u8::try_from(row.risk_level).map_err(|_| DomainError::OutOfRange {
            field: "risk_level",
            detail: format!("{} not in 1..=10", row.risk_level),
        })?;
        let strategy = Strategy {
            id: row.id,
            name: row.name,
            category: row.category,
            rate_bps,
            risk_level,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            active: row.active,
            rate_source: RateSourceTag::from(row.rate_source),
            rate_updated_at: row.rate_updated_at,
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl TryFrom<&Strategy> for NewStrategyModel {
    type Error = DomainError;

    fn try_from(strategy: &Strategy) -> Result<Self, Self::Error> {
        let rate_bps = i32::try_from(strategy.rate_bps).map_err(|_| DomainError::OutOfRange {
            field: "rate_bps",
            detail: format!("{} exceeds column range", strategy.rate_bps),
        })?;
        Ok(Self {
            id: strategy.id,
            name: strategy.name.clone(),
            category: strategy.category.clone(),
            rate_bps,
            risk_level: i16::from(strategy.risk_level),
            min_amount: strategy.min_amount,
            max_amount: strategy.max_amount,
            active: strategy.active,
            rate_source: strategy.rate_source.to_string(),
            rate_updated_at: strategy.rate_updated_at,
        })
    }
}
