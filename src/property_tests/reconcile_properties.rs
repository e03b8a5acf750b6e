// Property-based tests for mirror reconciliation.
//
// Property: Missing names are bounded
// However many listed objects are absent locally, at most
// `max_missing_names` of them are reported, in listing order, and the
// outcome is MissingLocal whenever at least one is absent.
//
// Property: Size comparison against tolerance
// With every object mirrored, a remote side equal to the local side is Ok
// with a zero difference, and a remote side larger than the local side by
// more than the tolerance is ExceedsTolerance.
//
// Property: Absent local directory
// Whatever the remote inventory, a missing local directory classifies as
// LocalDirMissing and no presence checks are reported.
//
// Property: Classification precedence
// LocalDirMissing beats MissingLocal, which beats the size comparison.

#[cfg(test)]
mod tests {
    use crate::config::ReconcileConfig;
    use crate::local::tree_size;
    use crate::outcome::{AuditOutcome, Findings, classify};
    use crate::reconciler::SizeReconciler;
    use crate::test_utils::{MockStorage, init_dummy_tracing_subscriber, make_stage};
    use crate::types::{ListingPage, ObjectEntry};
    use proptest::prelude::*;
    use std::fs;
    use std::path::Path;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    /// Writes each entry under `root` with its listed size.
    fn write_mirror(root: &Path, entries: &[ObjectEntry]) {
        for entry in entries {
            let path = root.join(&entry.name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, vec![0u8; entry.size_bytes as usize]).unwrap();
        }
    }

    /// Distinct file names under `PROD` with small sizes.
    fn arb_mirrored_entries() -> impl Strategy<Value = Vec<ObjectEntry>> {
        prop::collection::btree_map("[a-d]{1,3}(/[a-d]{1,3}){0,2}", 0u64..2048, 1..8).prop_map(
            |files| {
                files
                    .into_iter()
                    .enumerate()
                    // The index keeps a file from shadowing a directory.
                    .map(|(i, (name, size))| ObjectEntry::new(format!("PROD/{name}.{i}"), size))
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_missing_names_are_bounded(
            missing in 0usize..120,
            bound in 1usize..40,
        ) {
            init_dummy_tracing_subscriber();

            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("PROD")).unwrap();
            let entries: Vec<ObjectEntry> = (0..missing)
                .map(|i| ObjectEntry::new(format!("PROD/f{i:04}"), 1))
                .collect();

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender).with_pages(
                    "backups",
                    entries
                        .chunks(25)
                        .map(|chunk| ListingPage::succeeded(chunk.to_vec(), None))
                        .collect(),
                );
                let mut reconcile_config = ReconcileConfig::new("PROD", dir.path());
                reconcile_config.max_missing_names = bound;
                reconcile_config.include_segments = false;

                let report = SizeReconciler::new(make_stage(Box::new(storage)), reconcile_config)
                    .reconcile("backups")
                    .await
                    .unwrap();

                let expected: Vec<String> = entries
                    .iter()
                    .take(bound)
                    .map(|entry| entry.name.clone())
                    .collect();
                prop_assert_eq!(&report.missing_names, &expected);
                prop_assert_eq!(report.missing_bound_reached, missing >= bound);
                prop_assert_eq!(report.outcome.remote_size, missing as u64);
                let expected_outcome = if missing > 0 {
                    AuditOutcome::MissingLocal
                } else {
                    AuditOutcome::Ok
                };
                prop_assert_eq!(report.outcome.outcome, expected_outcome);

                Ok(())
            })?;
        }

        #[test]
        fn prop_size_difference_against_tolerance(
            entries in arb_mirrored_entries(),
            extra in prop::sample::select(vec![0u64, 6000]),
        ) {
            init_dummy_tracing_subscriber();

            let dir = tempfile::tempdir().unwrap();
            write_mirror(dir.path(), &entries);
            let local_size = tree_size(&dir.path().join("PROD")).unwrap();
            let file_bytes: u64 = entries.iter().map(|entry| entry.size_bytes).sum();
            // Segments make up for directory entries, plus the extra bytes.
            let segments_bytes = local_size - file_bytes + extra;

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender)
                    .with_pages("backups", vec![ListingPage::succeeded(entries.clone(), None)])
                    .with_pages(
                        "backups_segments",
                        vec![ListingPage::succeeded(
                            vec![ObjectEntry::new("PROD/seg/000001", segments_bytes)],
                            None,
                        )],
                    );
                let mut reconcile_config = ReconcileConfig::new("PROD", dir.path());
                reconcile_config.tolerance = 5000;

                let report = SizeReconciler::new(make_stage(Box::new(storage)), reconcile_config)
                    .reconcile("backups")
                    .await
                    .unwrap();

                prop_assert!(report.missing_names.is_empty());
                prop_assert_eq!(report.outcome.local_size, local_size);
                prop_assert_eq!(report.outcome.diff, extra as i128);
                let expected_outcome = if extra == 0 {
                    AuditOutcome::Ok
                } else {
                    AuditOutcome::ExceedsTolerance
                };
                prop_assert_eq!(report.outcome.outcome, expected_outcome);

                Ok(())
            })?;
        }

        #[test]
        fn prop_absent_local_dir_is_reported(
            sizes in prop::collection::vec(0u64..1_000_000, 0..30),
        ) {
            init_dummy_tracing_subscriber();

            let dir = tempfile::tempdir().unwrap();
            let entries: Vec<ObjectEntry> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| ObjectEntry::new(format!("PROD/f{i}"), *size))
                .collect();

            runtime().block_on(async {
                let (stats_sender, _stats_receiver) = async_channel::unbounded();
                let storage = MockStorage::new(stats_sender)
                    .with_pages("backups", vec![ListingPage::succeeded(entries, None)]);

                let report = SizeReconciler::new(
                    make_stage(Box::new(storage)),
                    ReconcileConfig::new("PROD", dir.path()),
                )
                .reconcile("backups")
                .await
                .unwrap();

                prop_assert_eq!(report.outcome.outcome, AuditOutcome::LocalDirMissing);
                prop_assert!(report.missing_names.is_empty());
                prop_assert_eq!(report.outcome.local_size, 0);
                prop_assert_eq!(report.outcome.remote_size, sizes.iter().sum::<u64>());

                Ok(())
            })?;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_classification_precedence(
            local_dir_present in any::<bool>(),
            missing_count in 0usize..30,
            diff in -1_000_000i128..1_000_000,
            tolerance in 0u64..500_000,
        ) {
            let outcome = classify(&Findings::Reconciliation {
                local_dir_present,
                missing_count,
                diff,
                tolerance,
            });

            let expected = if !local_dir_present {
                AuditOutcome::LocalDirMissing
            } else if missing_count > 0 {
                AuditOutcome::MissingLocal
            } else if diff > tolerance as i128 {
                AuditOutcome::ExceedsTolerance
            } else {
                AuditOutcome::Ok
            };
            prop_assert_eq!(outcome, expected);
        }
    }
}
