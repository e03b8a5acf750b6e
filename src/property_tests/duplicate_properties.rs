// Property-based tests for duplicate detection.
//
// Property: Equal metadata is a duplicate
// When an object and its nested copy agree on content length, ETag and
// content type, the pair is deletable and its nested size is reclaimable.
//
// Property: Any differing field is not a duplicate
// Changing exactly one of the three fields makes the pair a non-duplicate
// that is never deleted, even with erase enabled.
//
// Property: Only a single nested match forms a pair
// Zero or more than one successful stat of the nested key yields no pair.
//
// Property: Dry runs are repeatable
// Two dry runs over the same listing report identical pairs and issue no
// deletes.

#[cfg(test)]
mod tests {
    use crate::config::DuplicateCheckConfig;
    use crate::duplicates::{DuplicateDetector, headers_match, nested_key};
    use crate::test_utils::{MockStorage, headers, init_dummy_tracing_subscriber, make_stage};
    use crate::types::{ListingPage, ObjectEntry, ObjectHeaders, StatResult};
    use proptest::prelude::*;

    fn arb_headers() -> impl Strategy<Value = ObjectHeaders> {
        (
            0u64..10_000_000,
            "[0-9a-f]{32}",
            prop::sample::select(vec!["application/octet-stream", "text/plain", "application/gzip"]),
        )
            .prop_map(|(length, etag, content_type)| headers(length, &etag, content_type))
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z]{1,4}(/[a-z]{1,6}){0,3}"
    }

    /// Copy of `object_headers` with exactly one field changed.
    fn mutate(object_headers: &ObjectHeaders, field: usize) -> ObjectHeaders {
        let mut changed = object_headers.clone();
        match field {
            0 => changed.content_length += 1,
            1 => changed.etag.push('0'),
            _ => changed.content_type.push_str("+x"),
        }
        changed
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn single_entry_listing(name: &str, size: u64) -> Vec<ListingPage> {
        vec![ListingPage::succeeded(vec![ObjectEntry::new(name, size)], None)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_equal_headers_form_deletable_pair(
            name in arb_name(),
            object_headers in arb_headers(),
            erase in any::<bool>(),
        ) {
            init_dummy_tracing_subscriber();
            let nested = nested_key(&name);

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender)
                    .with_pages("backups", single_entry_listing(&name, object_headers.content_length))
                    .with_object(&name, object_headers.clone())
                    .with_object(&nested, object_headers.clone());
                let detector = DuplicateDetector::new(
                    make_stage(Box::new(storage.clone())),
                    &DuplicateCheckConfig { prefix: None, erase },
                );

                let report = detector.detect("backups", None).await.unwrap();

                prop_assert_eq!(report.deletable().count(), 1);
                prop_assert_eq!(report.reclaimable_bytes, object_headers.content_length);
                if erase {
                    prop_assert_eq!(storage.delete_calls(), vec![nested.clone()]);
                    prop_assert_eq!(report.deleted_count(), 1);
                } else {
                    prop_assert!(storage.delete_calls().is_empty());
                }

                Ok(())
            })?;
        }

        #[test]
        fn prop_any_differing_field_is_not_duplicate(
            name in arb_name(),
            object_headers in arb_headers(),
            field in 0usize..3,
        ) {
            init_dummy_tracing_subscriber();
            let nested = nested_key(&name);
            let nested_headers = mutate(&object_headers, field);
            prop_assert!(!headers_match(&object_headers, &nested_headers));

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender)
                    .with_pages("backups", single_entry_listing(&name, object_headers.content_length))
                    .with_object(&name, object_headers.clone())
                    .with_object(&nested, nested_headers);
                let detector = DuplicateDetector::new(
                    make_stage(Box::new(storage.clone())),
                    &DuplicateCheckConfig { prefix: None, erase: true },
                );

                let report = detector.detect("backups", None).await.unwrap();

                prop_assert_eq!(report.pairs.len(), 1);
                prop_assert_eq!(report.not_duplicates().count(), 1);
                prop_assert_eq!(report.reclaimable_bytes, 0);
                prop_assert!(storage.delete_calls().is_empty());

                Ok(())
            })?;
        }

        #[test]
        fn prop_zero_or_many_nested_matches_form_no_pair(
            name in arb_name(),
            object_headers in arb_headers(),
            matches in prop::sample::select(vec![0usize, 2, 3]),
        ) {
            init_dummy_tracing_subscriber();
            let nested = nested_key(&name);
            let mut nested_results = vec![StatResult::not_found(nested.as_str(), "NotFound")];
            nested_results.extend(
                std::iter::repeat_with(|| StatResult::found(nested.as_str(), object_headers.clone()))
                    .take(matches),
            );

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender)
                    .with_pages("backups", single_entry_listing(&name, object_headers.content_length))
                    .with_object(&name, object_headers.clone())
                    .with_stat(&nested, nested_results);
                let detector = DuplicateDetector::new(
                    make_stage(Box::new(storage.clone())),
                    &DuplicateCheckConfig { prefix: None, erase: true },
                );

                let report = detector.detect("backups", None).await.unwrap();

                prop_assert!(report.pairs.is_empty());
                prop_assert_eq!(report.reclaimable_bytes, 0);
                prop_assert_eq!(report.ambiguous.len(), usize::from(matches > 1));
                prop_assert!(storage.delete_calls().is_empty());

                Ok(())
            })?;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn prop_dry_runs_are_repeatable(
            objects in prop::collection::btree_map(arb_name(), (arb_headers(), any::<bool>()), 1..10),
        ) {
            init_dummy_tracing_subscriber();

            let (stats_sender, _stats_receiver) = async_channel::unbounded();
            let mut storage = MockStorage::new(stats_sender);
            let mut entries = Vec::new();
            for (name, (object_headers, has_copy)) in &objects {
                entries.push(ObjectEntry::new(name.clone(), object_headers.content_length));
                storage = storage.with_object(name, object_headers.clone());
                if *has_copy {
                    storage = storage.with_object(&nested_key(name), object_headers.clone());
                }
            }
            let storage = storage.with_pages("backups", vec![ListingPage::succeeded(entries, None)]);

            runtime().block_on(async {
                let dry_run = DuplicateCheckConfig { prefix: None, erase: false };
                let first = DuplicateDetector::new(make_stage(Box::new(storage.clone())), &dry_run)
                    .detect("backups", None)
                    .await
                    .unwrap();
                let second = DuplicateDetector::new(make_stage(Box::new(storage.clone())), &dry_run)
                    .detect("backups", None)
                    .await
                    .unwrap();

                prop_assert_eq!(&first.pairs, &second.pairs);
                prop_assert_eq!(first.reclaimable_bytes, second.reclaimable_bytes);
                prop_assert!(storage.delete_calls().is_empty());
                prop_assert!(first.delete_responses.is_empty());

                Ok(())
            })?;
        }
    }
}
