//! Scenario 6 of the end-to-end suite: tag proximity decreases as the
//! shared taxonomy prefix shrinks.

use memoire_core::taxonomy::prox;

#[test]
fn proximity_decreases_as_shared_prefix_shrinks() {
    let same_subsection = prox("01-0010-0010", "01-0010-0020");
    let same_section = prox("01-0010-0010", "01-0020-0010");
    let different_class = prox("01-0010-0010", "02-0010-0010");

    assert!(same_subsection > same_section, "{same_subsection} should exceed {same_section}");
    assert!(same_section > different_class, "{same_section} should exceed {different_class}");
}
