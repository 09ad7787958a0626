pub mod company;
pub mod concept;
pub mod dimension;
pub mod fact;
pub mod filing;
pub mod ingest;
pub mod period;
pub mod relationship;
pub mod statement_fact;
pub mod statement_item;

pub use company::{Company, NewCompany};
pub use concept::{Concept, NewConcept};
pub use dimension::{NewXbrlDimension, XbrlDimension};
pub use fact::{FinancialFact, NewFinancialFact};
pub use filing::{Filing, NewFiling};
pub use ingest::{
    FilingDocument, FilingMetadata, RawCalculationArc, RawFact, RawFootnote, RawPresentationArc,
    RawRelationships,
};
pub use period::{NewTimePeriod, TimePeriod};
pub use relationship::{
    CalculationArc, FootnoteReference, NewCalculationArc, NewFootnoteReference, NewPresentationArc,
    PresentationArc,
};
pub use statement_fact::{
    BalanceSheetFact, CashFlowFact, ComprehensiveIncomeFact, EquityStatementFact,
    IncomeStatementFact, NewBalanceSheetFact, NewCashFlowFact, NewComprehensiveIncomeFact,
    NewEquityStatementFact, NewIncomeStatementFact,
};
pub use statement_item::{NewStatementItem, StatementItem};
