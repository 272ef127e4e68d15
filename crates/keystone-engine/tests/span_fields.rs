//! Service spans carry their request fields

mod common;

use std::fmt;
use std::sync::{Arc, Mutex};

use common::*;
use keystone_core::LockPurpose;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// (span name, field name, recorded value)
#[derive(Clone, Default)]
struct SpanFields(Arc<Mutex<Vec<(String, String, String)>>>);

impl SpanFields {
    fn value(&self, span: &str, field: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(s, f, _)| s == span && f == field)
            .map(|(_, _, v)| v.clone())
    }
}

struct FieldVisitor<'a> {
    span: &'static str,
    out: &'a mut Vec<(String, String, String)>,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.out
            .push((self.span.to_string(), field.name().to_string(), format!("{:?}", value)));
    }
}

impl<S: Subscriber> Layer<S> for SpanFields {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut out = self.0.lock().unwrap();
        attrs.record(&mut FieldVisitor {
            span: attrs.metadata().name(),
            out: &mut out,
        });
    }
}

#[tokio::test]
async fn test_service_spans_record_amounts() {
    let fields = SpanFields::default();
    let _default = tracing::subscriber::set_default(Registry::default().with(fields.clone()));

    let h = harness(test_config());
    let curve_id = funded_curve(&h, &[("alice", 60), ("bob", 40)]).await;
    h.engine.market.sell(&curve_id, &user("bob"), 4).await.unwrap();
    assert_eq!(fields.value("buy", "shares").as_deref(), Some("60"));
    assert_eq!(fields.value("sell", "shares").as_deref(), Some("4"));

    h.engine.vault.deposit(&user("alice"), 50).await.unwrap();
    h.engine
        .vault
        .lock(&user("alice"), LockPurpose::DmDeposit, 20, "thread-5")
        .await
        .unwrap();
    assert_eq!(fields.value("deposit", "amount").as_deref(), Some("50"));
    assert_eq!(fields.value("lock", "amount").as_deref(), Some("20"));
    assert_eq!(fields.value("lock", "correlation_id").as_deref(), Some("thread-5"));

    h.engine.graduation.freeze(&curve_id, &user("creator")).await.unwrap();
    h.engine.graduation.compute_distribution(&curve_id, 1_000).await.unwrap();
    assert_eq!(
        fields.value("compute_distribution", "acquired_quantity").as_deref(),
        Some("1000")
    );
}
