use std::sync::OnceLock;

use super::MappingSpec;

const USERS: &str = include_str!("users.yaml");

pub(super) fn users() -> &'static MappingSpec {
    static INSTANCE: OnceLock<MappingSpec> = OnceLock::new();
    INSTANCE.get_or_init(|| MappingSpec::from_yaml(USERS).expect("builtin users mapping"))
}
