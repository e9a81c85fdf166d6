mod common;

use ai2query::error::QueryError;
use ai2query::execution::postgres::ServerError;
use ai2query::execution_loop::{LoopContext, RetryController, RetryOutcome, SqlErrorClass};
use ai2query::reflexion::MemoryReflexionLog;
use ai2query::schema::{SchemaContext, SchemaDescriptor};
use common::{orders_schema, row, ScriptedGenerator, StubProbe};
use serde_json::json;
use sqlx::postgres::PgErrorPosition;

const GOOD_SQL: &str = "SELECT * FROM orders";
const BAD_SQL_1: &str = "SELECT totl FROM orders";
const BAD_SQL_2: &str = "SELECT amount FROM orders";
const BAD_SQL_3: &str = "SELECT price FROM orders";

fn probe() -> StubProbe {
    StubProbe::new()
        .rows(GOOD_SQL, vec![row(json!({"id": 1, "total": "9.50"}))])
        .error(BAD_SQL_1, "column \"totl\" does not exist")
        .error(BAD_SQL_2, "column \"amount\" does not exist")
        .error(BAD_SQL_3, "column \"price\" does not exist")
}

#[tokio::test]
async fn test_scenario_a_first_attempt_succeeds() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new([GOOD_SQL]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("list orders", &ctx).await.unwrap();

    match outcome {
        RetryOutcome::Succeeded { sql, rows, attempts } => {
            assert_eq!(sql, GOOD_SQL);
            assert_eq!(rows.len(), 1);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(generator.call_count(), 1);
    assert!(reflexion.records().is_empty());
}

#[tokio::test]
async fn test_scenario_b_unknown_table_is_rejected_without_execution() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new(["SELECT * FROM widgets"]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("list widgets", &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RetryOutcome::RejectedByValidation {
            sql: "SELECT * FROM widgets".to_string(),
            attempts: 1,
        }
    );
    assert_eq!(generator.call_count(), 1);
    assert_eq!(probe.run_count(), 0);

    let records = reflexion.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].question, "list widgets");
    assert_eq!(records[0].sql, "SELECT * FROM widgets");
    assert_eq!(records[0].error_class, Some(SqlErrorClass::Ungrounded));
}

#[tokio::test]
async fn test_scenario_c_succeeds_on_third_attempt() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new([BAD_SQL_1, BAD_SQL_2, GOOD_SQL]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("order totals", &ctx).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.sql(), GOOD_SQL);
    assert_eq!(probe.runs(), vec![BAD_SQL_1, BAD_SQL_2, GOOD_SQL]);
    assert!(reflexion.records().is_empty());

    // Each retry prompt carries the previous attempt's error verbatim.
    let calls = generator.calls();
    assert!(!calls[0][1].content.contains("previous query failed"));
    assert!(calls[1][1].content.contains("column \"totl\" does not exist"));
    assert!(calls[2][1].content.contains("column \"amount\" does not exist"));
    assert!(!calls[2][1].content.contains("totl"));
}

#[tokio::test]
async fn test_scenario_d_exhausts_retries_with_last_error() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new([BAD_SQL_1, BAD_SQL_2, BAD_SQL_3]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("order prices", &ctx).await.unwrap();

    assert_eq!(
        outcome,
        RetryOutcome::ExhaustedRetries {
            sql: BAD_SQL_3.to_string(),
            error: "column \"price\" does not exist".to_string(),
            attempts: 3,
        }
    );
    assert_eq!(generator.call_count(), 3);

    let records = reflexion.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].error, "column \"price\" does not exist");
    assert_eq!(records[0].error_class, Some(SqlErrorClass::UndefinedColumn));
}

#[tokio::test]
async fn test_never_exceeds_max_attempts() {
    for max_attempts in 1..=5 {
        let schema = orders_schema();
        let generator = ScriptedGenerator::new([BAD_SQL_1]);
        let probe = probe();
        let reflexion = MemoryReflexionLog::new();
        let ctx = LoopContext {
            schema: &schema,
            generator: &generator,
            probe: &probe,
            reflexion: &reflexion,
        };

        let outcome = RetryController::new(max_attempts)
            .run("q", &ctx)
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), max_attempts);
        assert_eq!(generator.call_count(), max_attempts as usize);
        assert_eq!(probe.run_count(), max_attempts as usize);
    }
}

#[tokio::test]
async fn test_rejection_after_execution_failure_stops_immediately() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new([BAD_SQL_1, "SELECT 'No matching table found' WHERE false;"]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("q", &ctx).await.unwrap();

    assert!(matches!(outcome, RetryOutcome::RejectedByValidation { attempts: 2, .. }));
    assert_eq!(generator.call_count(), 2);
    assert_eq!(probe.run_count(), 1);
}

#[tokio::test]
async fn test_remote_generation_error_is_fatal() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::failing("connection refused");
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let err = RetryController::new(3).run("q", &ctx).await.unwrap_err();

    assert!(matches!(err, QueryError::RemoteGeneration(_)));
    assert_eq!(generator.call_count(), 1);
    assert_eq!(probe.run_count(), 0);
    assert!(reflexion.records().is_empty());
}

#[tokio::test]
async fn test_missing_schema_is_a_configuration_error() {
    let schema = SchemaContext::new(SchemaDescriptor::new());
    let generator = ScriptedGenerator::new([GOOD_SQL]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let err = RetryController::new(3).run("q", &ctx).await.unwrap_err();

    assert!(matches!(err, QueryError::Configuration(_)));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_fenced_model_output_is_unwrapped_before_validation() {
    let schema = orders_schema();
    let generator = ScriptedGenerator::new(["```sql\nSELECT * FROM orders\n```"]);
    let probe = probe();
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("q", &ctx).await.unwrap();

    assert_eq!(outcome.sql(), GOOD_SQL);
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_server_hint_reaches_next_prompt() {
    let failing_sql = "SELECT totl FROM orders o";
    let hint = "Perhaps you meant to reference the column \"o.total\".";
    let error_text = ServerError {
        message: "column \"totl\" does not exist",
        position: Some(PgErrorPosition::Original(8)),
        detail: None,
        hint: Some(hint),
        context: None,
    }
    .render(failing_sql);

    let schema = orders_schema();
    let generator = ScriptedGenerator::new([failing_sql, GOOD_SQL]);
    let probe = probe().error(failing_sql, &error_text);
    let reflexion = MemoryReflexionLog::new();
    let ctx = LoopContext {
        schema: &schema,
        generator: &generator,
        probe: &probe,
        reflexion: &reflexion,
    };

    let outcome = RetryController::new(3).run("order totals", &ctx).await.unwrap();

    assert!(outcome.is_success());
    let retry_context = &generator.calls()[1][1].content;
    assert!(retry_context.contains(&error_text));
    assert!(retry_context.contains(&format!("HINT:  {}", hint)));
    assert!(retry_context.contains("LINE 1: SELECT totl FROM orders o"));
}
