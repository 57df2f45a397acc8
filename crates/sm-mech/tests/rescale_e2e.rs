// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralMech — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! End-to-end runs over synthetic snapshot directories.

use approx::assert_relative_eq;
use ndarray::{array, ArrayD};
use std::path::Path;
use tempfile::tempdir;
use twofloat::TwoFloat;

use sm_mech::theory::momentum::{homogeneous_envelope, impulse_pair};
use sm_mech::{
    projection_gap, register_architecture, Architecture, LayerDescriptor, LayerKind,
    MomentumHyper, Orchestrator, Real, SgdHyper,
};
use sm_store::{Snapshot, BUFFERS_GROUP, PARAMS_GROUP};

type Entries = Vec<(String, ArrayD<f64>)>;

fn t(name: &str, tensor: ArrayD<f64>) -> (String, ArrayD<f64>) {
    (name.to_string(), tensor)
}

fn write_step(dir: &Path, step: u64, params: &Entries, buffers: &Entries) {
    let mut snap = Snapshot::new();
    for (name, tensor) in params {
        snap.insert(PARAMS_GROUP, name, tensor);
    }
    for (name, tensor) in buffers {
        snap.insert(BUFFERS_GROUP, name, tensor);
    }
    snap.save_bincode(dir.join(format!("step{step}.bin"))).unwrap();
}

fn chain_arch(name: &str, raws: &[&str]) -> Architecture {
    Architecture::new(
        name,
        raws.iter()
            .enumerate()
            .map(|(i, raw)| LayerDescriptor::new(raw, &format!("conv{}", i + 1), LayerKind::Conv))
            .collect(),
    )
}

fn ones2x2() -> ArrayD<f64> {
    array![[1.0, 1.0], [1.0, 1.0]].into_dyn()
}

fn zeros2() -> ArrayD<f64> {
    array![0.0, 0.0].into_dyn()
}

fn nan2x2() -> ArrayD<f64> {
    array![[f64::NAN, f64::NAN], [f64::NAN, f64::NAN]].into_dyn()
}

#[test]
fn theoretical_matches_empirical_at_step_zero_without_decay() {
    // First caller wins; parallel tests may race the guard.
    let _ = sm_mech::telemetry::init_tracing();
    register_architecture(chain_arch("e2e-pair", &["features.0", "features.3"]));
    let dir = tempdir().unwrap();
    write_step(
        dir.path(),
        0,
        &vec![
            t("features.0.weight", ones2x2()),
            t("features.0.bias", zeros2()),
            t("features.3.weight", ones2x2()),
            t("features.3.bias", zeros2()),
        ],
        &Vec::new(),
    );

    let orch = Orchestrator::new(dir.path(), "e2e-pair").unwrap();
    let report = orch.rescale(&[0], &SgdHyper::new(0.1, 0.0)).unwrap();

    let theoretical = &report.theoretical["conv2"][&0];
    let empirical = &report.empirical["conv2"][&0];
    assert_eq!(theoretical, empirical);
    assert_eq!(*theoretical, vec![0.0, 0.0]);
}

#[test]
fn plain_solver_applies_buffer_correction_with_quadratic_lr() {
    register_architecture(chain_arch("e2e-buffered", &["features.0", "features.3"]));
    let dir = tempdir().unwrap();

    let w1_0 = array![[1.0, 2.0], [0.0, 1.0]].into_dyn();
    let b1_0 = array![0.5, -0.5].into_dyn();
    let w2_0 = array![[1.0, 1.0], [2.0, 0.0]].into_dyn();
    write_step(
        dir.path(),
        0,
        &vec![
            t("features.0.weight", w1_0.clone()),
            t("features.0.bias", b1_0.clone()),
            t("features.3.weight", w2_0.clone()),
            t("features.3.bias", zeros2()),
        ],
        &Vec::new(),
    );

    let gw1 = array![[1.0, 0.0], [0.0, 1.0]].into_dyn();
    let gb1 = array![0.25, 0.25].into_dyn();
    let gw2 = array![[2.0, 2.0], [1.0, 1.0]].into_dyn();
    write_step(
        dir.path(),
        5,
        &vec![
            // measured weights drifted; values independent of the theory path
            t("features.0.weight", array![[0.9, 1.9], [0.1, 0.9]].into_dyn()),
            t("features.0.bias", array![0.4, -0.4].into_dyn()),
            t("features.3.weight", array![[1.1, 0.9], [1.9, 0.1]].into_dyn()),
            t("features.3.bias", array![0.1, -0.1].into_dyn()),
        ],
        &vec![
            t("features.0.weight.integral_buffer", gw1.clone()),
            t("features.0.bias.integral_buffer", gb1.clone()),
            t("features.3.weight.integral_buffer", gw2.clone()),
            t("features.3.bias.integral_buffer", array![1.0, 1.0].into_dyn()),
        ],
    );

    let hyper = SgdHyper::new(0.1, 0.0);
    let orch = Orchestrator::new(dir.path(), "e2e-buffered").unwrap();
    let report = orch.rescale(&[0, 5], &hyper).unwrap();

    // wd = 0 makes the decay factor exactly 1; the prediction is the
    // initial condition plus the lr²-scaled noise integral.
    let noise = hyper.lr * hyper.lr;
    let mut q1w = w1_0.mapv(|v| v * v);
    q1w += &(&gw1 * noise);
    let mut q1b = b1_0.mapv(|v| v * v);
    q1b += &(&gb1 * noise);
    let mut q2w = w2_0.mapv(|v| v * v);
    q2w += &(&gw2 * noise);
    let expected = projection_gap::<f64>(&q2w, &q1w, Some(&q1b)).unwrap();

    let got = &report.theoretical["conv2"][&5];
    assert_eq!(got.len(), expected.len());
    for (g, e) in got.iter().zip(&expected) {
        assert_relative_eq!(*g, *e, max_relative = 1e-15);
    }

    // The linear-lr inversion variant must differ once buffers kick in.
    let inversion = orch.inversion(&[0, 5], &hyper).unwrap();
    assert_ne!(
        inversion.theoretical["conv2"][&5],
        report.theoretical["conv2"][&5]
    );
    assert_eq!(
        inversion.theoretical["conv2"][&0],
        report.theoretical["conv2"][&0]
    );
    assert_eq!(inversion.empirical, report.empirical);
}

#[test]
fn orchestrator_is_idempotent() {
    register_architecture(chain_arch("e2e-idem", &["features.0", "features.3"]));
    let dir = tempdir().unwrap();
    write_step(
        dir.path(),
        0,
        &vec![
            t("features.0.weight", array![[0.3, -1.2], [0.7, 0.1]].into_dyn()),
            t("features.0.bias", array![0.01, -0.02].into_dyn()),
            t("features.3.weight", array![[1.4, 0.2], [-0.6, 0.8]].into_dyn()),
            t("features.3.bias", array![0.05, 0.0].into_dyn()),
        ],
        &Vec::new(),
    );
    write_step(
        dir.path(),
        3,
        &vec![
            t("features.0.weight", array![[0.2, -1.0], [0.6, 0.2]].into_dyn()),
            t("features.0.bias", array![0.02, -0.01].into_dyn()),
            t("features.3.weight", array![[1.3, 0.1], [-0.5, 0.7]].into_dyn()),
            t("features.3.bias", array![0.04, 0.01].into_dyn()),
        ],
        &vec![
            t(
                "features.0.weight.integral_buffer",
                array![[0.1, 0.2], [0.3, 0.4]].into_dyn(),
            ),
            t("features.0.bias.integral_buffer", array![0.1, 0.2].into_dyn()),
            t(
                "features.3.weight.integral_buffer",
                array![[0.5, 0.6], [0.7, 0.8]].into_dyn(),
            ),
            t("features.3.bias.integral_buffer", array![0.3, 0.4].into_dyn()),
        ],
    );

    let hyper = SgdHyper::new(0.05, 1e-3);
    let orch = Orchestrator::new(dir.path(), "e2e-idem").unwrap();
    let first = orch.rescale(&[0, 3], &hyper).unwrap();
    let second = orch.rescale(&[0, 3], &hyper).unwrap();
    assert_eq!(first, second);
}

#[test]
fn non_finite_momentum_buffers_leave_the_homogeneous_term() {
    register_architecture(chain_arch(
        "e2e-nan",
        &["features.0", "features.3", "features.6"],
    ));
    let dir = tempdir().unwrap();

    let params = vec![
        t("features.0.weight", array![[1.0, 2.0], [0.5, 1.0]].into_dyn()),
        t("features.0.bias", array![0.1, 0.2].into_dyn()),
        t("features.3.weight", array![[0.5, 1.5], [1.0, 2.0]].into_dyn()),
        t("features.3.bias", array![0.3, 0.4].into_dyn()),
        t("features.6.weight", array![[2.0, 0.5], [1.5, 1.0]].into_dyn()),
        t("features.6.bias", array![0.0, 0.1].into_dyn()),
    ];
    write_step(dir.path(), 0, &params, &Vec::new());

    let mut nan_buffers = Vec::new();
    for raw in ["features.0", "features.3", "features.6"] {
        nan_buffers.push((format!("{raw}.weight.integral_buffer_1"), nan2x2()));
        nan_buffers.push((
            format!("{raw}.bias.integral_buffer_1"),
            array![f64::NAN, f64::NAN].into_dyn(),
        ));
        nan_buffers.push((format!("{raw}.weight.integral_buffer_2"), nan2x2()));
        nan_buffers.push((
            format!("{raw}.bias.integral_buffer_2"),
            array![f64::NAN, f64::NAN].into_dyn(),
        ));
    }
    write_step(dir.path(), 5, &params, &nan_buffers);

    // wd = 0 collapses the envelope to 1.
    let hyper = MomentumHyper::new(0.1, 0.0, 0.9, 0.0);
    let orch = Orchestrator::new(dir.path(), "e2e-nan").unwrap();
    let report = orch.rescale_momentum(&[0, 5], &hyper).unwrap();

    for layer in ["conv2", "conv3"] {
        let at_zero = &report.theoretical[layer][&0];
        let at_five = &report.theoretical[layer][&5];
        assert!(at_five.iter().all(|v| v.is_finite()), "value leaked NaN");
        for (a, b) in at_five.iter().zip(at_zero) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }
}

#[test]
fn momentum_corrections_follow_the_impulse_pair() {
    register_architecture(chain_arch("e2e-mom", &["features.0", "features.3"]));
    let dir = tempdir().unwrap();

    let w1_0 = array![[1.0, 2.0], [0.5, 1.0]].into_dyn();
    let b1_0 = array![0.1, 0.2].into_dyn();
    let w2_0 = array![[0.5, 1.5], [1.0, 2.0]].into_dyn();
    let params = vec![
        t("features.0.weight", w1_0.clone()),
        t("features.0.bias", b1_0.clone()),
        t("features.3.weight", w2_0.clone()),
        t("features.3.bias", array![0.3, 0.4].into_dyn()),
    ];
    write_step(dir.path(), 0, &params, &Vec::new());

    let g1w_in = array![[0.1, 0.2], [0.3, 0.4]].into_dyn();
    let g1b_in = array![0.05, 0.06].into_dyn();
    let g2w_in = array![[0.01, 0.02], [0.03, 0.04]].into_dyn();
    let g2b_in = array![0.005, 0.006].into_dyn();
    let g1w_out = array![[0.7, 0.8], [0.9, 1.0]].into_dyn();
    let g2w_out = array![[0.07, 0.08], [0.09, 0.1]].into_dyn();
    write_step(
        dir.path(),
        4,
        &params,
        &vec![
            t("features.0.weight.integral_buffer_1", g1w_in.clone()),
            t("features.0.bias.integral_buffer_1", g1b_in.clone()),
            t("features.0.weight.integral_buffer_2", g2w_in.clone()),
            t("features.0.bias.integral_buffer_2", g2b_in.clone()),
            t("features.3.weight.integral_buffer_1", g1w_out.clone()),
            t(
                "features.3.bias.integral_buffer_1",
                array![0.07, 0.08].into_dyn(),
            ),
            t("features.3.weight.integral_buffer_2", g2w_out.clone()),
            t(
                "features.3.bias.integral_buffer_2",
                array![0.007, 0.008].into_dyn(),
            ),
        ],
    );

    let hyper = MomentumHyper::new(0.1, 5e-4, 0.9, 0.0);
    let orch = Orchestrator::new(dir.path(), "e2e-mom").unwrap();
    let report = orch.rescale_momentum(&[0, 4], &hyper).unwrap();

    // Reassemble the closed form from its published pieces.
    let damping = hyper.damping::<TwoFloat>();
    let time: TwoFloat = hyper.tau(4);
    let envelope = homogeneous_envelope(&damping, time).unwrap();
    let (s1, s2) = impulse_pair(&damping, time).unwrap();
    let gain: TwoFloat = hyper.forcing_gain();

    let w1_sq = w1_0.mapv(|v| v * v);
    let b1_sq = b1_0.mapv(|v| v * v);
    let w2_sq = w2_0.mapv(|v| v * v);
    let base = projection_gap::<TwoFloat>(&w2_sq, &w1_sq, Some(&b1_sq)).unwrap();
    let gap1 = projection_gap::<TwoFloat>(&g1w_out, &g1w_in, Some(&g1b_in)).unwrap();
    let gap2 = projection_gap::<TwoFloat>(&g2w_out, &g2w_in, Some(&g2b_in)).unwrap();

    let got = &report.theoretical["conv2"][&4];
    assert_eq!(got.len(), base.len());
    for i in 0..got.len() {
        let expected = envelope * base[i] + gain * s1 * gap1[i] + gain * s2 * gap2[i];
        assert_relative_eq!(got[i], expected.to_f64(), max_relative = 1e-12);
    }
}

#[test]
fn translation_projection_tracks_the_final_layer() {
    register_architecture(Architecture::new(
        "e2e-mlp",
        vec![
            LayerDescriptor::new("1", "fc1", LayerKind::Linear),
            LayerDescriptor::new("3", "classifier", LayerKind::Linear),
        ],
    ));
    let dir = tempdir().unwrap();

    write_step(
        dir.path(),
        0,
        &vec![
            t("1.weight", ones2x2()),
            t("1.bias", zeros2()),
            t("3.weight", array![[1.0, 2.0], [3.0, 4.0]].into_dyn()),
            t("3.bias", array![0.5, 0.25].into_dyn()),
        ],
        &Vec::new(),
    );
    write_step(
        dir.path(),
        2,
        &vec![
            t("1.weight", ones2x2()),
            t("1.bias", zeros2()),
            t("3.weight", array![[0.9, 1.8], [2.7, 3.6]].into_dyn()),
            t("3.bias", array![0.45, 0.2].into_dyn()),
        ],
        &Vec::new(),
    );

    let hyper = SgdHyper::new(0.1, 1e-3);
    let orch = Orchestrator::new(dir.path(), "e2e-mlp").unwrap();

    let series = orch.translation(&[0, 2], &hyper, false).unwrap();
    assert_eq!(series.steps, vec![0, 2]);
    // Envelope is exactly 1 at step 0.
    assert_eq!(series.theoretical[0], series.empirical[0]);
    assert_eq!(series.empirical[0], vec![4.0, 6.0, 0.75]);

    let normalized = orch.translation(&[0, 2], &hyper, true).unwrap();
    assert_eq!(normalized.empirical[0], vec![1.0, 1.0, 1.0]);
    assert_relative_eq!(normalized.theoretical[0][0], 1.0, max_relative = 1e-15);
}

#[test]
fn missing_snapshot_surfaces_a_store_error() {
    register_architecture(chain_arch("e2e-missing", &["features.0", "features.3"]));
    let dir = tempdir().unwrap();
    write_step(
        dir.path(),
        0,
        &vec![
            t("features.0.weight", ones2x2()),
            t("features.0.bias", zeros2()),
            t("features.3.weight", ones2x2()),
            t("features.3.bias", zeros2()),
        ],
        &Vec::new(),
    );

    let orch = Orchestrator::new(dir.path(), "e2e-missing").unwrap();
    let err = orch
        .rescale(&[0, 7], &SgdHyper::new(0.1, 0.0))
        .unwrap_err();
    assert!(matches!(err, sm_mech::MechError::Store(_)));
}
