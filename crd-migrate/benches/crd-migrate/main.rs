use crd_migrate::{Record, mapping::MappingSpec};

fn main() {
    divan::main();
}

fn users() -> Vec<Record> {
    let input = std::fs::read_to_string("tests/crd-migrate/testdata/kubeai-users/source.yaml")
        .unwrap();
    crd_migrate::parse_records(&input).unwrap()
}

#[divan::bench]
fn map_users(bencher: divan::Bencher) {
    let records = users();
    let mapping = MappingSpec::builtin_users();
    bencher.bench(|| {
        records
            .iter()
            .map(|record| mapping.apply(record).unwrap())
            .collect::<Vec<_>>()
    });
}

#[divan::bench]
fn transform_users(bencher: divan::Bencher) {
    let input = std::fs::read_to_string("tests/crd-migrate/testdata/kubeai-users/source.yaml")
        .unwrap();
    let mapping = MappingSpec::builtin_users();
    bencher.bench(|| {
        let mut out = Vec::new();
        crd_migrate::transform(mapping, &input, &mut out).unwrap();
        out
    });
}
