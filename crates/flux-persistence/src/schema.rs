// @generated schema — kept hand-maintained since the migration is small.

diesel::table! {
    journal_entries (seq) {
        seq -> BigInt,
        coordinator_run_id -> Text,
        flow_run_id -> Text,
        entity_run_id -> Text,
        flow_name -> Text,
        entity_name -> Nullable<Text>,
        run_type -> Text,
        started_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
        status -> Nullable<Text>,
        serialized_watermark -> Nullable<Text>,
        row_count -> BigInt,
        error -> Nullable<Text>,
    }
}
