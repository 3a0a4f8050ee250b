//! Policy evaluation benchmarks.
//!
//! # Benchmarks
//!
//! - `enforce_todo_query`: standard todo chain for a signed-in viewer
//! - `enforce_anonymous`: the deny path for an anonymous context
//! - `list_own_todos`: full store round trip with narrowing applied
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench policy_eval
//! ```

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rowguard::{
    Client, FilterHandle, Operation, Policy, PolicyOptions, RequestContext, TodoFilter, Viewer,
};

fn bench_enforce(c: &mut Criterion) {
    let policy = Policy::standard(&PolicyOptions::default()).unwrap();
    let viewer_ctx = RequestContext::background().with_viewer(Viewer::user(1));
    let anonymous = RequestContext::background();

    c.bench_function("enforce_todo_query", |b| {
        b.iter(|| {
            let mut filter = FilterHandle::from(TodoFilter::new(Operation::Query));
            policy.enforce(black_box(&viewer_ctx), &mut filter).unwrap();
            black_box(filter)
        });
    });

    c.bench_function("enforce_anonymous", |b| {
        b.iter(|| {
            let mut filter = FilterHandle::from(TodoFilter::new(Operation::Query));
            black_box(policy.enforce(black_box(&anonymous), &mut filter).is_err())
        });
    });
}

fn bench_list(c: &mut Criterion) {
    let client = Client::open_in_memory().unwrap();
    let internal = RequestContext::background().with_viewer(Viewer::internal_authn());
    for n in 1..=10 {
        client
            .users()
            .create()
            .username(format!("user{n}"))
            .password_hash("unused")
            .save(&internal)
            .unwrap();
    }
    for i in 0..1000_i64 {
        let owner = i % 10 + 1;
        let ctx = RequestContext::background().with_viewer(Viewer::user(owner));
        client
            .todos()
            .create()
            .owner_id(owner)
            .text(format!("todo {i}"))
            .save(&ctx)
            .unwrap();
    }

    let ctx = RequestContext::background().with_viewer(Viewer::user(3));
    c.bench_function("list_own_todos", |b| {
        b.iter(|| black_box(client.todos().query().all(&ctx).unwrap().len()));
    });
}

criterion_group!(benches, bench_enforce, bench_list);
criterion_main!(benches);
