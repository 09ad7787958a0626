use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// **StatementType Enum**
///
/// The closed set of statements the organizer routes concepts into.
/// Stored in the database as lowercase snake_case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    ComprehensiveIncome,
    EquityStatement,
    Other,
}

impl StatementType {
    pub const ALL: [StatementType; 5] = [
        StatementType::IncomeStatement,
        StatementType::BalanceSheet,
        StatementType::CashFlow,
        StatementType::ComprehensiveIncome,
        StatementType::EquityStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::IncomeStatement => "income_statement",
            StatementType::BalanceSheet => "balance_sheet",
            StatementType::CashFlow => "cash_flow",
            StatementType::ComprehensiveIncome => "comprehensive_income",
            StatementType::EquityStatement => "equity_statement",
            StatementType::Other => "other",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income_statement" => Ok(StatementType::IncomeStatement),
            "balance_sheet" => Ok(StatementType::BalanceSheet),
            "cash_flow" => Ok(StatementType::CashFlow),
            "comprehensive_income" => Ok(StatementType::ComprehensiveIncome),
            "equity_statement" => Ok(StatementType::EquityStatement),
            "other" => Ok(StatementType::Other),
            _ => Err(format!("Invalid statement type: {}", s)),
        }
    }
}

/// **AccountingStandard Enum**
///
/// Which framework a company reports under. Upgraded from the default to
/// IFRS when a 20-F/ESEF filing arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountingStandard {
    UsGaap,
    Ifrs,
}

impl AccountingStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountingStandard::UsGaap => "US-GAAP",
            AccountingStandard::Ifrs => "IFRS",
        }
    }
}

impl fmt::Display for AccountingStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountingStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "US-GAAP" | "USGAAP" | "US_GAAP" => Ok(AccountingStandard::UsGaap),
            "IFRS" | "ESEF" => Ok(AccountingStandard::Ifrs),
            _ => Err(format!("Invalid accounting standard: {}", s)),
        }
    }
}

/// **PeriodType Enum**
///
/// XBRL context period shape. Instants and durations are distinct period
/// rows even when they share a fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    Duration,
    Instant,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Duration => "duration",
            PeriodType::Instant => "instant",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duration" => Ok(PeriodType::Duration),
            "instant" => Ok(PeriodType::Instant),
            _ => Err(format!("Invalid period type: {}", s)),
        }
    }
}

/// **RelationshipSource Enum**
///
/// Provenance of a calculation/presentation arc or statement item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipSource {
    /// Extracted from the filing's own linkbases
    Xbrl,
    /// Derived from dimensional breakdowns
    Dimensional,
    /// Synthesized from a standard statement template
    Standard,
    /// Computed by the pipeline (synthetic rows, derived totals)
    Calculated,
}

impl RelationshipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipSource::Xbrl => "xbrl",
            RelationshipSource::Dimensional => "dimensional",
            RelationshipSource::Standard => "standard",
            RelationshipSource::Calculated => "calculated",
        }
    }
}

impl fmt::Display for RelationshipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationshipSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xbrl" => Ok(RelationshipSource::Xbrl),
            "dimensional" => Ok(RelationshipSource::Dimensional),
            "standard" => Ok(RelationshipSource::Standard),
            "calculated" => Ok(RelationshipSource::Calculated),
            _ => Err(format!("Invalid relationship source: {}", s)),
        }
    }
}

/// **BalanceSheetSide Enum**
///
/// Which column of the balance sheet a statement item renders under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSheetSide {
    Assets,
    LiabilitiesEquity,
}

impl BalanceSheetSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceSheetSide::Assets => "assets",
            BalanceSheetSide::LiabilitiesEquity => "liabilities_equity",
        }
    }
}

impl fmt::Display for BalanceSheetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BalanceSheetSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assets" => Ok(BalanceSheetSide::Assets),
            "liabilities_equity" => Ok(BalanceSheetSide::LiabilitiesEquity),
            _ => Err(format!("Invalid balance sheet side: {}", s)),
        }
    }
}

/// **EquityComponent Enum**
///
/// Column dimension of the equity-statement matrix, extracted from the
/// `ComponentsOfEquityAxis` dimension member. The total row carries no
/// component (NULL in the database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquityComponent {
    ShareCapital,
    TreasuryShares,
    RetainedEarnings,
    OtherReserves,
}

impl EquityComponent {
    pub const ALL: [EquityComponent; 4] = [
        EquityComponent::ShareCapital,
        EquityComponent::TreasuryShares,
        EquityComponent::RetainedEarnings,
        EquityComponent::OtherReserves,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquityComponent::ShareCapital => "share_capital",
            EquityComponent::TreasuryShares => "treasury_shares",
            EquityComponent::RetainedEarnings => "retained_earnings",
            EquityComponent::OtherReserves => "other_reserves",
        }
    }

    /// Map a `ComponentsOfEquityAxis` member name to a component column
    pub fn from_member(member: &str) -> Option<Self> {
        match member {
            "IssuedCapitalMember" => Some(EquityComponent::ShareCapital),
            "TreasurySharesMember" => Some(EquityComponent::TreasuryShares),
            "RetainedEarningsMember" => Some(EquityComponent::RetainedEarnings),
            "OtherReservesMember" => Some(EquityComponent::OtherReserves),
            _ => None,
        }
    }
}

impl fmt::Display for EquityComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EquityComponent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "share_capital" => Ok(EquityComponent::ShareCapital),
            "treasury_shares" => Ok(EquityComponent::TreasuryShares),
            "retained_earnings" => Ok(EquityComponent::RetainedEarnings),
            "other_reserves" => Ok(EquityComponent::OtherReserves),
            _ => Err(format!("Invalid equity component: {}", s)),
        }
    }
}

/// **Severity Enum**
///
/// Severity of a validation result; drives the weighted report score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Weight used by the report score: ERROR 3, WARNING 2, INFO 1
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Error => 3,
            Severity::Warning => 2,
            Severity::Info => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_type_round_trips() {
        // REQUIREMENT: Statement types persist as stable database strings
        // PURPOSE: Verify Display and FromStr agree for every variant
        for st in StatementType::ALL {
            assert_eq!(st.as_str().parse::<StatementType>().unwrap(), st);
        }
    }

    #[test]
    fn equity_component_member_mapping() {
        // REQUIREMENT: Equity columns come from ComponentsOfEquityAxis members
        // PURPOSE: Verify the member-name mapping and its rejection of
        // unrelated members
        assert_eq!(
            EquityComponent::from_member("IssuedCapitalMember"),
            Some(EquityComponent::ShareCapital)
        );
        assert_eq!(
            EquityComponent::from_member("TreasurySharesMember"),
            Some(EquityComponent::TreasuryShares)
        );
        assert_eq!(EquityComponent::from_member("GeographyMember"), None);
    }

    #[test]
    fn severity_weights() {
        // REQUIREMENT: Report scores weight ERROR 3, WARNING 2, INFO 1
        // PURPOSE: Pin the weights the validation score is built on
        assert_eq!(Severity::Error.weight(), 3);
        assert_eq!(Severity::Warning.weight(), 2);
        assert_eq!(Severity::Info.weight(), 1);
    }

    #[test]
    fn esef_parses_as_ifrs() {
        // REQUIREMENT: ESEF filings report under IFRS
        // PURPOSE: Verify the accounting-standard parser folds ESEF into IFRS
        assert_eq!(
            "ESEF".parse::<AccountingStandard>().unwrap(),
            AccountingStandard::Ifrs
        );
    }
}
