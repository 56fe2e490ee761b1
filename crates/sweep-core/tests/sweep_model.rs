//! Model-level guarantees of parameter sweeps.
//!
//! - Members of different step types with the same display name and type
//!   form one sweepable class.
//! - Every axis of a parameter sweep always has the sweep's length.
//! - Saved sweeps load back equal, objects included.
//! - Reference-typed values are copied through their codec, or shared only
//!   when the cloner allows it.
//! - Points added by a resize never share a mutable object with their seed.
//! - Imported tables drive the next run.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use sweep_core::persist::{self, PersistedParameterSweep};
use sweep_core::prelude::*;
use sweep_core::resolver::resolve;
use sweep_core::{import, CloneError, CloneOutcome, EquivalenceKey};
use sweep_test_utils::{
    generator_type, type_a, type_b, waveform, RecordingRunner, SweepFixture, Waveform,
};

#[test]
fn same_name_and_type_share_a_class() {
    let fx = SweepFixture::new(SweepMode::WithinRun);
    let classes = resolve(&fx.tree, fx.sweep);

    let x = &classes[&EquivalenceKey::new("x", TypeDescriptor::Int)];
    assert_eq!(
        x,
        &vec![type_a().get_member("x").unwrap(), type_b().get_member("x").unwrap()]
    );
    let gain = &classes[&EquivalenceKey::new("Amplifier \\ gain", TypeDescriptor::Float)];
    assert_eq!(gain.len(), 1);
    assert_eq!(classes.len(), 2);
}

#[derive(Debug, Clone)]
enum Op {
    Resize(usize),
    AddGain,
    RemoveGain,
    Disable(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8).prop_map(Op::Resize),
        Just(Op::AddGain),
        Just(Op::RemoveGain),
        (0usize..8).prop_map(Op::Disable),
    ]
}

proptest! {
    #[test]
    fn axes_always_share_the_sweep_length(ops in prop::collection::vec(op(), 0..24)) {
        let cloner = ValueCloner::new(Arc::new(sweep_test_utils::registry()));
        let mut sweep = ParameterSweep::new();
        sweep
            .add_param(SweepParam::new([type_a().get_member("x").unwrap()]).unwrap(), &cloner)
            .unwrap();

        for op in ops {
            match op {
                Op::Resize(len) => {
                    sweep.set_len(len, &cloner).unwrap();
                }
                Op::AddGain => {
                    if sweep.param("Amplifier \\ gain").is_none() {
                        let gain = SweepParam::new([type_a().get_member("gain").unwrap()]).unwrap();
                        sweep.add_param(gain, &cloner).unwrap();
                    }
                }
                Op::RemoveGain => {
                    sweep.remove_param("Amplifier \\ gain");
                }
                Op::Disable(index) => {
                    let in_range = index < sweep.len();
                    prop_assert_eq!(sweep.set_enabled(index, false).is_ok(), in_range);
                }
            }
            for param in sweep.params() {
                prop_assert_eq!(param.values().len(), sweep.len());
                prop_assert_eq!(param.enabled_flags().len(), sweep.len());
            }
            prop_assert!(sweep.enabled_indices().iter().all(|i| *i < sweep.len()));
        }
    }
}

fn generator_fixture() -> SweepFixture {
    let mut fx = SweepFixture::new(SweepMode::AcrossRuns);
    fx.tree
        .add_child(fx.sweep, "gen", PropertyStep::new(generator_type()))
        .unwrap();
    fx
}

#[test]
fn saved_sweep_loads_back_equal() {
    let mut fx = generator_fixture();
    fx.add_axis(
        vec![generator_type().get_member("shape").unwrap()],
        vec![waveform(&[1.0, 2.0]), waveform(&[3.0])],
    );
    fx.add_axis(
        vec![type_a().get_member("x").unwrap(), type_b().get_member("x").unwrap()],
        vec![Value::Int(4), Value::Int(5)],
    );
    fx.sweep_mut().set_enabled(1, false).unwrap();
    fx.sweep_mut().set_cursor(Some(0));

    let json = persist::save(fx.sweep()).to_json().unwrap();
    let stored = PersistedParameterSweep::from_json(&json).unwrap();

    let mut copy = generator_fixture();
    let report = persist::load(&mut copy.tree, copy.sweep, stored).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.loaded, vec!["shape".to_string(), "x".to_string()]);

    let (original, loaded) = (fx.sweep(), copy.sweep());
    assert_eq!(loaded.params(), original.params());
    assert_eq!(loaded.mode(), SweepMode::AcrossRuns);
    assert_eq!(loaded.cursor(), Some(0));
    assert_eq!(loaded.enabled_indices(), vec![0]);

    // objects come back live, not as stored snapshots
    let Value::Object(shape) = &loaded.param("shape").unwrap().values()[0] else {
        panic!("expected an object");
    };
    assert_eq!(shape.downcast_ref::<Waveform>().unwrap().points(), vec![1.0, 2.0]);
}

#[test]
fn objects_copy_through_their_codec() {
    let cloner = ValueCloner::new(Arc::new(sweep_test_utils::registry()));
    let original = waveform(&[1.0]);
    let copy = cloner.clone_value(&original).unwrap();
    assert_eq!(copy.outcome, CloneOutcome::TextRoundTrip);

    let Value::Object(shared) = &original else {
        unreachable!()
    };
    shared.downcast_ref::<Waveform>().unwrap().push(2.0);
    let Value::Object(copied) = &copy.value else {
        unreachable!()
    };
    assert_eq!(copied.downcast_ref::<Waveform>().unwrap().points(), vec![1.0]);
}

#[test]
fn grown_object_points_are_independent() {
    let cloner = ValueCloner::new(Arc::new(sweep_test_utils::registry()));
    let shape = SweepParam::new([generator_type().get_member("shape").unwrap()])
        .unwrap()
        .with_default(waveform(&[1.0]))
        .unwrap();
    let mut sweep = ParameterSweep::new();
    sweep.add_param(shape, &cloner).unwrap();
    assert_eq!(sweep.set_len(3, &cloner).unwrap(), CloneOutcome::TextRoundTrip);

    let points = |index: usize| {
        let Value::Object(object) = &sweep.param("shape").unwrap().values()[index] else {
            panic!("expected an object");
        };
        object.downcast_ref::<Waveform>().unwrap().points()
    };
    let Value::Object(second) = &sweep.param("shape").unwrap().values()[1] else {
        panic!("expected an object");
    };
    second.downcast_ref::<Waveform>().unwrap().push(2.0);

    assert_eq!(points(1), vec![1.0, 2.0]);
    assert_eq!(points(0), vec![1.0]);
    assert_eq!(points(2), vec![1.0]);
}

#[test]
fn objects_without_codec_are_shared_unless_strict() {
    let cloner = ValueCloner::new(Arc::new(TypeRegistry::new()));
    let original = waveform(&[1.0]);
    let copy = cloner.clone_value(&original).unwrap();
    assert!(copy.outcome.is_shared());

    let strict = cloner.with_strict(true);
    assert!(matches!(
        strict.clone_value(&original),
        Err(CloneError::NotClonable { .. })
    ));
}

#[tokio::test]
async fn imported_table_drives_the_next_run() {
    let mut fx = SweepFixture::new(SweepMode::WithinRun);
    let table: Vec<Vec<String>> = [
        ["Enabled", "X"],
        ["true", "10"],
        ["no", "20"],
        ["1", "30"],
    ]
    .iter()
    .map(|row| row.iter().map(ToString::to_string).collect())
    .collect();

    let imported = import::import_parameters(&mut fx.tree, fx.sweep, &table).unwrap();
    assert_eq!(imported, 3);
    assert_eq!(fx.sweep().enabled_indices(), vec![0, 2]);

    let runner = RecordingRunner::new("x");
    SweepEngine::default()
        .run(&mut fx.tree, fx.sweep, &runner, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(runner.first_child_values(), vec![Value::Int(10), Value::Int(30)]);
}

#[test]
fn malformed_import_leaves_sweep_untouched() {
    let mut fx = SweepFixture::with_x(SweepMode::WithinRun, &[1, 2]);
    let table = vec![
        vec!["x".to_string()],
        vec!["ten".to_string()],
    ];
    let err = import::import_parameters(&mut fx.tree, fx.sweep, &table).unwrap_err();
    assert!(matches!(err, SweepError::Import(_)));
    assert_eq!(
        fx.sweep().param("x").unwrap().values(),
        &[Value::Int(1), Value::Int(2)]
    );
}
