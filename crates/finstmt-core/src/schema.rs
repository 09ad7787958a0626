// Warehouse star schema. Kept in sync with migrations/ by hand; the
// column order in each table! block matches the CREATE TABLE order.

diesel::table! {
    dim_companies (id) {
        id -> Uuid,
        #[max_length = 20]
        ticker -> Varchar,
        #[max_length = 255]
        company_name -> Varchar,
        #[max_length = 20]
        accounting_standard -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    dim_concepts (id) {
        id -> Uuid,
        #[max_length = 50]
        taxonomy -> Varchar,
        #[max_length = 500]
        concept_name -> Varchar,
        #[max_length = 255]
        normalized_label -> Nullable<Varchar>,
        #[max_length = 500]
        preferred_label -> Nullable<Varchar>,
        #[max_length = 50]
        concept_type -> Nullable<Varchar>,
        #[max_length = 20]
        balance_type -> Nullable<Varchar>,
        #[max_length = 20]
        period_type -> Nullable<Varchar>,
        #[max_length = 100]
        data_type -> Nullable<Varchar>,
        is_abstract -> Bool,
        #[max_length = 50]
        statement_type -> Nullable<Varchar>,
        parent_concept_id -> Nullable<Uuid>,
        calculation_weight -> Nullable<Numeric>,
        hierarchy_level -> Nullable<Int4>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    dim_time_periods (id) {
        id -> Uuid,
        #[max_length = 20]
        period_type -> Varchar,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        instant_date -> Nullable<Date>,
        fiscal_year -> Nullable<Int4>,
        fiscal_quarter -> Nullable<Int4>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    dim_filings (id) {
        id -> Uuid,
        company_id -> Uuid,
        #[max_length = 20]
        filing_type -> Varchar,
        fiscal_year_end -> Date,
        source_url -> Nullable<Text>,
        validation_score -> Nullable<Numeric>,
        completeness_score -> Nullable<Numeric>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    dim_xbrl_dimensions (id) {
        id -> Uuid,
        dimension_json -> Jsonb,
        #[max_length = 64]
        dimension_hash -> Varchar,
        #[max_length = 255]
        axis_name -> Nullable<Varchar>,
        #[max_length = 255]
        member_name -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    fact_financial_metrics (id) {
        id -> Uuid,
        company_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        filing_id -> Uuid,
        dimension_id -> Nullable<Uuid>,
        value_numeric -> Nullable<Numeric>,
        value_text -> Nullable<Text>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        decimals -> Nullable<Int4>,
        scale_int -> Nullable<Int4>,
        #[max_length = 100]
        xbrl_format -> Nullable<Varchar>,
        #[max_length = 255]
        context_id -> Nullable<Varchar>,
        #[max_length = 255]
        fact_id_xbrl -> Nullable<Varchar>,
        source_line -> Nullable<Int4>,
        order_index -> Nullable<Int4>,
        is_primary -> Bool,
        is_calculated -> Bool,
        #[max_length = 50]
        extraction_method -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    rel_calculation_hierarchy (id) {
        id -> Uuid,
        filing_id -> Uuid,
        parent_concept_id -> Uuid,
        child_concept_id -> Uuid,
        weight -> Numeric,
        order_index -> Nullable<Int4>,
        #[max_length = 255]
        arcrole -> Nullable<Varchar>,
        priority -> Int4,
        #[max_length = 20]
        source -> Varchar,
        is_synthetic -> Bool,
        confidence -> Numeric,
    }
}

diesel::table! {
    rel_presentation_hierarchy (id) {
        id -> Uuid,
        filing_id -> Uuid,
        parent_concept_id -> Nullable<Uuid>,
        child_concept_id -> Uuid,
        order_index -> Nullable<Int4>,
        #[max_length = 500]
        preferred_label -> Nullable<Varchar>,
        #[max_length = 50]
        statement_type -> Varchar,
        role_uri -> Nullable<Text>,
        #[max_length = 255]
        arcrole -> Nullable<Varchar>,
        priority -> Int4,
        #[max_length = 20]
        source -> Varchar,
        is_synthetic -> Bool,
    }
}

diesel::table! {
    rel_footnote_references (id) {
        id -> Uuid,
        filing_id -> Uuid,
        fact_id -> Nullable<Uuid>,
        concept_id -> Nullable<Uuid>,
        footnote_text -> Nullable<Text>,
        #[max_length = 255]
        footnote_label -> Nullable<Varchar>,
        #[max_length = 255]
        footnote_role -> Nullable<Varchar>,
        #[max_length = 10]
        footnote_lang -> Varchar,
    }
}

diesel::table! {
    rel_statement_items (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        #[max_length = 50]
        statement_type -> Varchar,
        display_order -> Int4,
        is_header -> Bool,
        is_main_item -> Bool,
        role_uri -> Nullable<Text>,
        #[max_length = 20]
        source -> Varchar,
        #[max_length = 20]
        side -> Nullable<Varchar>,
    }
}

diesel::table! {
    fact_income_statement (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        value_numeric -> Nullable<Numeric>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        display_order -> Int4,
        is_header -> Bool,
        hierarchy_level -> Nullable<Int4>,
        parent_concept_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    fact_balance_sheet (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        value_numeric -> Nullable<Numeric>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        display_order -> Int4,
        is_header -> Bool,
        hierarchy_level -> Nullable<Int4>,
        parent_concept_id -> Nullable<Uuid>,
        #[max_length = 20]
        side -> Nullable<Varchar>,
    }
}

diesel::table! {
    fact_cash_flow (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        value_numeric -> Nullable<Numeric>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        display_order -> Int4,
        is_header -> Bool,
        hierarchy_level -> Nullable<Int4>,
        parent_concept_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    fact_comprehensive_income (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        value_numeric -> Nullable<Numeric>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        display_order -> Int4,
        is_header -> Bool,
        hierarchy_level -> Nullable<Int4>,
        parent_concept_id -> Nullable<Uuid>,
    }
}

diesel::table! {
    fact_equity_statement (id) {
        id -> Uuid,
        filing_id -> Uuid,
        concept_id -> Uuid,
        period_id -> Uuid,
        value_numeric -> Nullable<Numeric>,
        #[max_length = 50]
        unit_measure -> Nullable<Varchar>,
        display_order -> Int4,
        is_header -> Bool,
        hierarchy_level -> Nullable<Int4>,
        parent_concept_id -> Nullable<Uuid>,
        #[max_length = 50]
        equity_component -> Nullable<Varchar>,
    }
}

diesel::joinable!(dim_filings -> dim_companies (company_id));
diesel::joinable!(rel_statement_items -> dim_filings (filing_id));
diesel::joinable!(rel_statement_items -> dim_concepts (concept_id));

diesel::allow_tables_to_appear_in_same_query!(
    dim_companies,
    dim_concepts,
    dim_time_periods,
    dim_filings,
    dim_xbrl_dimensions,
    fact_financial_metrics,
    rel_calculation_hierarchy,
    rel_presentation_hierarchy,
    rel_footnote_references,
    rel_statement_items,
    fact_income_statement,
    fact_balance_sheet,
    fact_cash_flow,
    fact_comprehensive_income,
    fact_equity_statement,
);
