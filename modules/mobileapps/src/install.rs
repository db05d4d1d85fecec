//! Scheme installation for the mobile group.

use genapi::scheme::{SchemeBuilder, TypeDescriptor};

use crate::v1alpha1;

/// Registers the mobile kinds with the builder. Idempotent: running it again
/// in the same process (e.g. tests assembling several servers) is a no-op.
pub fn install(builder: &mut SchemeBuilder) {
    let gv = v1alpha1::group_version();
    builder.register(
        gv.with_kind(crate::KIND),
        TypeDescriptor::new()
            .with_defaulter(v1alpha1::default_mobile_app)
            .with_validator(v1alpha1::validate_mobile_app),
    );
    builder.register(
        gv.with_kind(format!("{}List", crate::KIND)),
        TypeDescriptor::new(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_twice_registers_each_kind_once() {
        let mut builder = SchemeBuilder::new();
        install(&mut builder);
        install(&mut builder);
        let scheme = builder.build();

        let kinds = scheme.kinds_for(&v1alpha1::group_version());
        assert_eq!(kinds, vec!["MobileApp", "MobileAppList"]);
    }
}
