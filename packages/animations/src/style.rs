//! Style Maps
//!
//! Ordered property maps plus the helpers used to copy, apply and erase them.

use indexmap::IndexMap;

use crate::driver::{AnimationDriver, ElementId};
use crate::util::dash_case_to_camel_case;

/// An ordered `property -> value` style map. Insertion order is kept so
/// keyframes and state styles come out in the order they were declared.
pub type StyleMap = IndexMap<String, String>;

/// Value resolved to the element's computed style once the animation plays.
pub const AUTO_STYLE: &str = "*";

/// Value resolved to the element's style before the animation starts.
pub const PRE_STYLE: &str = "!";

/// One entry of a `style()` call: either the `*` wildcard or a map.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleEntry {
    Wildcard,
    Map(StyleMap),
}

/// Builds a style map from `(prop, value)` pairs.
pub fn style_map<K, V, I>(pairs: I) -> StyleMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Flattens a list of style maps into one map, later entries winning.
pub fn normalize_styles(styles: &[StyleMap]) -> StyleMap {
    let mut normalized = StyleMap::new();
    for data in styles {
        copy_styles(data, &mut normalized);
    }
    normalized
}

pub fn copy_styles(styles: &StyleMap, destination: &mut StyleMap) {
    for (prop, value) in styles {
        destination.insert(prop.clone(), value.clone());
    }
}

/// Expands `*` entries against `all_styles` and merges everything else.
pub fn flatten_styles(input: &[StyleEntry], all_styles: &StyleMap) -> StyleMap {
    let mut styles = StyleMap::new();
    for token in input {
        match token {
            StyleEntry::Wildcard => {
                for prop in all_styles.keys() {
                    styles.insert(prop.clone(), AUTO_STYLE.to_string());
                }
            }
            StyleEntry::Map(map) => copy_styles(map, &mut styles),
        }
    }
    styles
}

/// Writes `styles` inline onto `element`, recording the previous inline
/// values into `former_styles` when given.
pub fn set_styles(
    driver: &dyn AnimationDriver,
    element: ElementId,
    styles: &StyleMap,
    mut former_styles: Option<&mut StyleMap>,
) {
    for (prop, value) in styles {
        let camel_prop = dash_case_to_camel_case(prop);
        if let Some(former) = former_styles.as_deref_mut() {
            if !former.contains_key(prop) {
                let previous = driver.get_inline_style(element, &camel_prop).unwrap_or_default();
                former.insert(prop.clone(), previous);
            }
        }
        driver.set_style(element, &camel_prop, value);
    }
}

/// Removes every property in `styles` from the element's inline style.
pub fn erase_styles(driver: &dyn AnimationDriver, element: ElementId, styles: &StyleMap) {
    for prop in styles.keys() {
        let camel_prop = dash_case_to_camel_case(prop);
        driver.remove_style(element, &camel_prop);
    }
}
