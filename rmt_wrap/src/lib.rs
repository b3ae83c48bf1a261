// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]
// Other warnings (as of rust 1.55)
#![deny(
    asm_sub_register,
    bad_asm_style,
    bindings_with_variant_name,
    clashing_extern_declarations,
    confusable_idents,
    const_item_mutation,
    deprecated,
    deref_nullptr,
    drop_bounds,
    dyn_drop,
    elided_lifetimes_in_paths,
    exported_private_dependencies,
    function_item_references,
    improper_ctypes,
    improper_ctypes_definitions,
    incomplete_features,
    inline_no_sanitize,
    invalid_value,
    irrefutable_let_patterns,
    large_assignments,
    mixed_script_confusables,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overlapping_range_endpoints,
    renamed_and_removed_lints,
    stable_features,
    dangling_pointers_from_temporaries,
    trivial_bounds,
    type_alias_bounds,
    uncommon_codepoints,
    unconditional_recursion,
    unknown_lints,
    unnameable_test_items,
    unused_comparisons,
    while_true
)]

//! Command line front end of rna_map_tools: downloading a run, demultiplexing
//! it and running rna-map on every construct.

pub mod download;
pub mod logging;
pub mod utils;

use anyhow::Result;
use log::info;
use parameters_yaml::Parameters;
use std::path::Path;

/// Load `--params` if given, otherwise the defaults.
pub fn load_params(path: Option<&Path>) -> Result<Parameters> {
    let params = match path {
        Some(path) => Parameters::from_file(path)?,
        None => {
            info!("no parameter file given, using defaults");
            Parameters::defaults()?
        }
    };
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_params() -> Result<()> {
        assert_eq!(load_params(None)?, Parameters::defaults()?);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("params.yml");
        std::fs::write(&path, "runmulti:\n  hide_rna_map_output: true\n")?;
        assert!(load_params(Some(&path))?.runmulti.hide_rna_map_output);

        let err = load_params(Some(&dir.path().join("missing.yml"))).unwrap_err();
        assert!(err.to_string().contains("could not read parameter file"));
        Ok(())
    }
}
