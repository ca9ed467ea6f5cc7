//! Capability filters over a directory snapshot.
//!
//! APIs are matched all-of, modes and mobility types any-of. An absent or
//! empty filter set keeps every provider.

use crate::domain::model::{ApiKind, DirectorySnapshot, MobilityType, Mode, Provider};
use std::collections::BTreeSet;

pub fn by_ids<'a>(
    snapshot: &'a DirectorySnapshot,
    ids: Option<&BTreeSet<String>>,
) -> Vec<&'a Provider> {
    match ids {
        // 空集合或未指定時不做篩選
        Some(ids) if !ids.is_empty() => snapshot
            .providers()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .collect(),
        _ => snapshot.providers().iter().collect(),
    }
}

pub fn requiring_all_apis<'a>(
    providers: Vec<&'a Provider>,
    apis: Option<&BTreeSet<ApiKind>>,
) -> Vec<&'a Provider> {
    match apis {
        Some(apis) if !apis.is_empty() => providers
            .into_iter()
            // API 必須全部支援
            .filter(|p| p.supports_all_apis(apis))
            .collect(),
        _ => providers,
    }
}

pub fn allowing_any_mode<'a>(
    providers: Vec<&'a Provider>,
    modes: Option<&BTreeSet<Mode>>,
) -> Vec<&'a Provider> {
    match modes {
        Some(modes) if !modes.is_empty() => providers
            .into_iter()
            // 任一交通模式符合即可
            .filter(|p| p.supports_any_mode(modes))
            .collect(),
        _ => providers,
    }
}

pub fn allowing_any_mobility_type<'a>(
    providers: Vec<&'a Provider>,
    types: Option<&BTreeSet<MobilityType>>,
) -> Vec<&'a Provider> {
    match types {
        Some(types) if !types.is_empty() => providers
            .into_iter()
            .filter(|p| p.supports_any_mobility_type(types))
            .collect(),
        _ => providers,
    }
}

/// Composed selector: id set, then APIs, then modes, then mobility types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFilter {
    pub ids: BTreeSet<String>,
    pub apis: BTreeSet<ApiKind>,
    pub modes: BTreeSet<Mode>,
    pub mobility_types: BTreeSet<MobilityType>,
}

impl ProviderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn requiring_api(mut self, api: ApiKind) -> Self {
        self.apis.insert(api);
        self
    }

    pub fn requiring_apis(mut self, apis: impl IntoIterator<Item = ApiKind>) -> Self {
        self.apis.extend(apis);
        self
    }

    pub fn allowing_modes(mut self, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.modes.extend(modes);
        self
    }

    pub fn allowing_mobility_types(mut self, types: impl IntoIterator<Item = MobilityType>) -> Self {
        self.mobility_types.extend(types);
        self
    }

    pub fn apply<'a>(&self, snapshot: &'a DirectorySnapshot) -> Vec<&'a Provider> {
        // 依序套用：id、API、模式、移動類型
        let selected = by_ids(snapshot, Some(&self.ids));
        let selected = requiring_all_apis(selected, Some(&self.apis));
        let selected = allowing_any_mode(selected, Some(&self.modes));
        allowing_any_mobility_type(selected, Some(&self.mobility_types))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> Provider {
        Provider::new(id, format!("http://{}/api", id))
    }

    fn ids(providers: &[&Provider]) -> Vec<String> {
        providers.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_by_ids_empty_or_absent_is_identity() {
        let snapshot = DirectorySnapshot::new(1, vec![provider("a"), provider("b")]);

        assert_eq!(ids(&by_ids(&snapshot, None)), vec!["a", "b"]);
        assert_eq!(ids(&by_ids(&snapshot, Some(&BTreeSet::new()))), vec!["a", "b"]);

        let wanted = BTreeSet::from(["b".to_string(), "zzz".to_string()]);
        assert_eq!(ids(&by_ids(&snapshot, Some(&wanted))), vec!["b"]);
    }

    #[test]
    fn test_apis_are_matched_all_of() {
        let p1 = provider("p1").with_apis([ApiKind::Places, ApiKind::Options]);
        let p2 = provider("p2").with_apis([ApiKind::Places]);

        let required = BTreeSet::from([ApiKind::Places, ApiKind::Options]);
        let kept = requiring_all_apis(vec![&p1, &p2], Some(&required));
        assert_eq!(ids(&kept), vec!["p1"]);

        let kept = requiring_all_apis(vec![&p1, &p2], None);
        assert_eq!(ids(&kept), vec!["p1", "p2"]);
    }

    #[test]
    fn test_modes_are_matched_any_of() {
        let p1 = provider("p1").with_modes([Mode::Car]);
        let p2 = provider("p2").with_modes([Mode::Bike]);

        let kept = allowing_any_mode(vec![&p1, &p2], Some(&BTreeSet::from([Mode::Car])));
        assert_eq!(ids(&kept), vec!["p1"]);

        let either = BTreeSet::from([Mode::Car, Mode::Bike]);
        let kept = allowing_any_mode(vec![&p1, &p2], Some(&either));
        assert_eq!(ids(&kept), vec!["p1", "p2"]);

        let kept = allowing_any_mode(vec![&p1, &p2], Some(&BTreeSet::new()));
        assert_eq!(ids(&kept), vec!["p1", "p2"]);
    }

    #[test]
    fn test_mobility_types_are_matched_any_of() {
        let p1 = provider("p1").with_mobility_types([MobilityType::FreeFloating]);
        let p2 = provider("p2");

        let wanted = BTreeSet::from([MobilityType::FreeFloating, MobilityType::RideSharing]);
        let kept = allowing_any_mobility_type(vec![&p1, &p2], Some(&wanted));
        assert_eq!(ids(&kept), vec!["p1"]);
    }

    #[test]
    fn test_filter_composes_as_and_across_kinds() {
        let snapshot = DirectorySnapshot::new(
            1,
            vec![
                provider("car-options")
                    .with_apis([ApiKind::Options, ApiKind::Booking])
                    .with_modes([Mode::Car]),
                provider("bike-options")
                    .with_apis([ApiKind::Options])
                    .with_modes([Mode::Bike]),
                provider("car-places")
                    .with_apis([ApiKind::Places])
                    .with_modes([Mode::Car]),
            ],
        );

        let filter = ProviderFilter::new()
            .requiring_api(ApiKind::Options)
            .allowing_modes([Mode::Car, Mode::Walk]);
        assert_eq!(ids(&filter.apply(&snapshot)), vec!["car-options"]);

        let filter = ProviderFilter::new()
            .requiring_api(ApiKind::Options)
            .with_ids(["bike-options", "car-places"]);
        assert_eq!(ids(&filter.apply(&snapshot)), vec!["bike-options"]);

        assert_eq!(ProviderFilter::new().apply(&snapshot).len(), 3);
    }
}
