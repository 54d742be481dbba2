use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use filter_engine::diagnostics::Diagnostics;
use filter_engine::filter::Filter;
use filter_engine::sql_compiler::SqlCompiler;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::hint::black_box;

const TEST_CASES: &[(&str, &str)] = &[
    ("simple", r#"{"path": "Status", "operator": "EQ", "value1": "Open"}"#),
    (
        "medium",
        r#"{"filters": [
            {"path": "Status", "operator": "EQ", "value1": "Open"},
            {"path": "Price", "operator": "BT", "value1": 10, "value2": 50},
            {"path": "Name", "operator": "Contains", "value1": "pro"}
        ], "and": true}"#,
    ),
    (
        "complex",
        r#"{"filters": [
            {"filters": [
                {"path": "Status", "operator": "EQ", "value1": "Open"},
                {"path": "Status", "operator": "EQ", "value1": "Pending"},
                {"path": "Status", "operator": "EQ", "value1": "Review"},
                {"path": "Status", "operator": "EQ", "value1": "Approved"},
                {"path": "Status", "operator": "EQ", "value1": "Testing"}
            ]},
            {"path": "Items", "operator": "Any", "variable": "item",
             "condition": {"path": "item/Quantity", "operator": "GT", "value1": 100}},
            {"path": "Name", "operator": "NotStartsWith", "value1": "Legacy"}
        ], "and": true}"#,
    ),
];

// 创建一个编译器实例并设置表映射
fn create_compiler() -> SqlCompiler {
    let mut compiler = SqlCompiler::new();
    let mut table_mapping = HashMap::new();
    table_mapping.insert("Product".to_string(), "products".to_string());
    table_mapping.insert("Items".to_string(), "order_items".to_string());
    compiler.set_table_mapping(table_mapping);
    compiler
}

fn build(input: &str) -> Filter {
    let mut diagnostics = Diagnostics::new();
    Filter::from_json(input, &mut diagnostics).expect("构造应该成功")
}

// 基准测试：构造与校验性能
fn benchmark_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction_performance");

    for &(name, input) in TEST_CASES {
        group.bench_with_input(BenchmarkId::new("from_json", name), &input, |b, &input| {
            b.iter(|| black_box(build(black_box(input))))
        });
    }

    group.finish();
}

// 基准测试：AST 编译性能
fn benchmark_ast(c: &mut Criterion) {
    let mut group = c.benchmark_group("ast_performance");

    for &(name, input) in TEST_CASES {
        let filter = build(input);
        group.bench_with_input(BenchmarkId::new("compile", name), &filter, |b, filter| {
            b.iter(|| match black_box(filter).ast(true) {
                Ok(ast) => black_box(ast),
                Err(_) => panic!("编译失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：OData 与 SQL 翻译性能
fn benchmark_translation(c: &mut Criterion) {
    let compiler = create_compiler();
    let mut group = c.benchmark_group("translation_performance");

    for &(name, input) in TEST_CASES {
        let ast = build(input).ast(false).expect("编译应该成功");

        group.bench_with_input(BenchmarkId::new("odata", name), &ast, |b, ast| {
            b.iter(|| black_box(filter_engine::odata::to_odata(black_box(ast)).expect("翻译应该成功")))
        });
        group.bench_with_input(BenchmarkId::new("sql", name), &ast, |b, ast| {
            b.iter(|| black_box(compiler.compile("Product", black_box(ast)).expect("翻译应该成功")))
        });
    }

    group.finish();
}

// 基准测试：客户端过滤
fn benchmark_evaluation(c: &mut Criterion) {
    let statuses = ["Open", "Pending", "Closed", "Review"];
    let records: Vec<Value> = (0..1000)
        .map(|i| {
            json!({
                "Status": statuses[i % statuses.len()],
                "Price": i % 100,
                "Name": format!("product {}", i),
                "Items": [{"Quantity": i % 250}],
            })
        })
        .collect();

    let mut group = c.benchmark_group("evaluation_performance");

    for &(name, input) in TEST_CASES {
        let filter = build(input);
        group.bench_with_input(BenchmarkId::new("apply_1000", name), &filter, |b, filter| {
            b.iter(|| black_box(filter_engine::evaluator::apply(black_box(&records), filter).len()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_construction,
    benchmark_ast,
    benchmark_translation,
    benchmark_evaluation
);
criterion_main!(benches);
