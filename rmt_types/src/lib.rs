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

pub mod construct_table;

pub use construct_table::{ConstructRow, ConstructTable, TableError};

/// Canonical name of a staged read-1 FASTQ. The demultiplexing tools and the
/// per-barcode output layout both rely on it.
pub const STAGED_R1_FASTQ: &str = "test_S1_L001_R1_001.fastq";
/// Canonical name of a staged read-2 FASTQ.
pub const STAGED_R2_FASTQ: &str = "test_S1_L001_R2_001.fastq";
/// Prefix shared by the staged FASTQ names, usable with `fastq_pair::find_paired_fastqs`.
pub const STAGED_FASTQ_PREFIX: &str = "test_S1";
/// Directory holding reads that did not match any barcode.
pub const NO_CALL_DIR: &str = "NC";
