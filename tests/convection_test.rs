//! End-to-end tests of the split convection term: quiescent no-op, pure
//! convection of a step profile, stagnation-point and heat-release
//! continuity anchoring, split-constant handling, sub-domain isolation,
//! and the quasi-2D velocity path.

use std::sync::Arc;

use flame_rs::{
    BilinearInterpolator, ContinuityBoundary, ContinuityMode, Geometry, IdealGasMixture,
    OneDimGrid, SolverTolerances, SplitConvection,
};

const P_ATM: f64 = 101325.0;
const W_AIR: f64 = 0.029;

/// Coordinator on a uniform grid with `n_spec` species of equal molar
/// mass, uniform 300 K air-like state.
fn uniform_setup(n: usize, geometry: Geometry, n_spec: usize) -> SplitConvection {
    let grid = Arc::new(OneDimGrid::uniform(0.0, 0.01, n, geometry).unwrap());
    let gas = Arc::new(IdealGasMixture::new(vec![W_AIR; n_spec], P_ATM).unwrap());
    let mut system = SplitConvection::new(grid, gas, n_spec, SolverTolerances::default());

    let u = vec![0.0; n];
    let temp = vec![300.0; n];
    let mut y = vec![vec![0.0; n]; n_spec];
    y[0].fill(1.0);
    system.set_state(&u, &temp, &y, 0.0).unwrap();

    let mut y_left = vec![0.0; n_spec];
    y_left[0] = 1.0;
    system.set_left_bc(300.0, &y_left).unwrap();
    system
}

/// Position where a monotone profile crosses 0.5, by linear interpolation.
fn front_position(x: &[f64], y: &[f64]) -> f64 {
    for j in 0..y.len() - 1 {
        if y[j] >= 0.5 && y[j + 1] < 0.5 {
            let frac = (y[j] - 0.5) / (y[j] - y[j + 1]);
            return x[j] + frac * (x[j + 1] - x[j]);
        }
    }
    panic!("no front in profile");
}

#[test]
fn test_uniform_state_is_unchanged() {
    let mut system = uniform_setup(11, Geometry::Planar, 1);
    system.set_rvzero(0.0);
    system.integrate_to_time(1e-3).unwrap();

    for j in 0..11 {
        assert!((system.u()[j]).abs() < 1e-8);
        assert!((system.temperature()[j] - 300.0).abs() < 300.0 * 1e-8);
        assert!((system.wmx()[j] - W_AIR).abs() < W_AIR * 1e-8);
        assert!((system.mass_fractions()[0][j] - 1.0).abs() < 1e-8);
        assert!(system.v()[j].abs() < 1e-12);
    }
}

#[test]
fn test_planar_pure_convection_advances_step_one_node() {
    // Two species of equal molar mass carry complementary step profiles,
    // keeping Wmx exactly uniform.
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 2);
    {
        let y = system.mass_fractions_mut();
        for j in 0..n {
            y[0][j] = if j < 5 { 1.0 } else { 0.0 };
            y[1][j] = 1.0 - y[0][j];
        }
    }
    system.set_left_bc(300.0, &[1.0, 0.0]).unwrap();
    system.set_rvzero(0.1);

    // One cell of travel: t = hh / V.
    let h = 0.001;
    let v = 0.1;
    system.integrate_to_time(h / v).unwrap();

    let x = system.grid().x.clone();
    let pos = front_position(&x, &system.mass_fractions()[0]);
    // Front started midway between nodes 4 and 5 and travels one cell.
    let expected = x[4] + 1.5 * h;
    assert!(
        (pos - expected).abs() < 0.5 * h,
        "front at {}, expected {}",
        pos,
        expected
    );

    // The complementary species mirrors the first.
    for j in 0..n {
        let sum = system.mass_fractions()[0][j] + system.mass_fractions()[1][j];
        assert!((sum - 1.0).abs() < 1e-7);
    }

    // Mass flux is uniform: no density change, no strain in continuity.
    for j in 0..n {
        assert!((system.v()[j] - v).abs() < 1e-12);
    }
}

#[test]
fn test_cylindrical_stagnation_zero_bc() {
    // Symmetric tangential strain U = a (x - x_c) puts the stagnation
    // structure at x_c: the integrated rV peaks where U changes sign.
    let n = 11;
    let a = 100.0;
    let x_c = 0.005;
    let mut system = uniform_setup(n, Geometry::Cylindrical, 1);
    let x = system.grid().x.clone();
    let u: Vec<f64> = x.iter().map(|&x| a * (x - x_c)).collect();
    let temp = vec![300.0; n];
    let y = vec![vec![1.0; n]];
    system.set_state(&u, &temp, &y, 0.0).unwrap();
    system.set_rvzero(0.0);
    system.evaluate().unwrap();

    // The discrete rV is largest at the node nearest the strain reversal.
    let rv0 = system.rv().to_vec();
    let j_max = (0..n)
        .max_by(|&i, &j| rv0[i].total_cmp(&rv0[j]))
        .unwrap();
    assert!((x[j_max] - x_c).abs() <= 0.001);

    // Anchor the left boundary so the flux crosses zero at the peak,
    // then let the Zero condition find the stagnation point.
    system.set_rvzero(-0.5 * (rv0[j_max] + rv0[j_max + 1]));
    system.evaluate().unwrap();
    system
        .update_continuity_boundary_condition(&[], ContinuityMode::Zero)
        .unwrap();

    let (j_bc, x_vzero) = match system.continuity_bc() {
        ContinuityBoundary::Zero { j_cont_bc, x_vzero } => (j_cont_bc, x_vzero),
        other => panic!("expected Zero boundary condition, got {:?}", other),
    };
    assert!(
        (x_vzero - x_c).abs() <= 0.001,
        "stagnation point at {}, expected near {}",
        x_vzero,
        x_c
    );

    // After re-anchoring, the flux crosses zero inside the anchor cell
    // and the nodal values there are small against the profile.
    system.evaluate().unwrap();
    let rv = system.rv();
    assert!(rv[j_bc] * rv[j_bc + 1] <= 0.0);
    let frac = (x_vzero - x[j_bc]) / (x[j_bc + 1] - x[j_bc]);
    let rv_at_anchor = rv[j_bc] + frac * (rv[j_bc + 1] - rv[j_bc]);
    let scale = rv.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
    assert!(
        rv_at_anchor.abs() < 0.1 * scale,
        "rV({}) = {}, scale {}",
        x_vzero,
        rv_at_anchor,
        scale
    );
}

#[test]
fn test_qdot_anchor_at_peak_heat_release() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    let qdot: Vec<f64> = (0..n)
        .map(|j| {
            let d = j as f64 - 7.0;
            1e8 * (-d * d / 2.0).exp()
        })
        .collect();
    system
        .update_continuity_boundary_condition(&qdot, ContinuityMode::Qdot)
        .unwrap();

    assert_eq!(system.continuity_bc().anchor(), Some(7));
    assert_eq!(system.rv()[7], 0.0);

    // The anchor holds through an evaluation.
    system.evaluate().unwrap();
    assert_eq!(system.rv()[7], 0.0);
}

#[test]
fn test_split_constant_passthrough() {
    let n = 11;
    let dt = 0.01;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    system.set_rvzero(0.0);
    system
        .set_split_constants(&vec![0.0; n], &vec![1.0; n], &[vec![0.0; n]])
        .unwrap();
    system.integrate_to_time(dt).unwrap();

    // Zero velocity: the forcing integrates exactly. The boundary node is
    // held by its Dirichlet condition.
    assert!((system.temperature()[0] - 300.0).abs() < 1e-12);
    for j in 1..n {
        assert!(
            (system.temperature()[j] - 300.01).abs() < 1e-9,
            "node {}: {}",
            j,
            system.temperature()[j]
        );
    }
    // U and Wmx are untouched.
    for j in 0..n {
        assert!(system.u()[j].abs() < 1e-12);
        assert!((system.wmx()[j] - W_AIR).abs() < 1e-12);
    }
}

#[test]
fn test_derivatives_linear_in_split_constants() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    system.set_rvzero(0.05);
    system.evaluate().unwrap();
    let dudt0 = system.dudt().to_vec();
    let dtdt0 = system.dtdt().to_vec();
    let dwdt0 = system.dwdt().to_vec();
    let dydt0 = system.dydt()[0].clone();

    let (du, dt, dy) = (1.5, -2.0, 0.25);
    system
        .set_split_constants(&vec![du; n], &vec![dt; n], &[vec![dy; n]])
        .unwrap();
    system.evaluate().unwrap();

    for j in 0..n {
        assert!((system.dudt()[j] - dudt0[j] - du).abs() < 1e-12);
        assert!((system.dydt()[0][j] - dydt0[j] - dy).abs() < 1e-12);
    }
    for j in 1..n {
        assert!((system.dtdt()[j] - dtdt0[j] - dt).abs() < 1e-12);
        // The Wmx constant is derived from the species constants:
        // dWmx = -Wmx^2 * dy / W for a single species.
        let dw = -W_AIR * W_AIR * dy / W_AIR;
        assert!(
            (system.dwdt()[j] - dwdt0[j] - dw).abs() < 1e-12,
            "node {}: {} vs {}",
            j,
            system.dwdt()[j],
            dwdt0[j] + dw
        );
    }
}

#[test]
fn test_continuity_closure() {
    // With a nonuniform installed density derivative, the discrete
    // continuity residual closes on every cell.
    let n = 11;
    for geometry in [Geometry::Planar, Geometry::Cylindrical] {
        let mut system = uniform_setup(n, geometry, 1);
        let x = system.grid().x.clone();
        let u: Vec<f64> = x.iter().map(|&x| 50.0 * (300.0 * x).cos()).collect();
        let temp = vec![300.0; n];
        let y = vec![vec![1.0; n]];
        system.set_state(&u, &temp, &y, 0.0).unwrap();
        let drhodt: Vec<f64> = x.iter().map(|&x| 2.0 * (500.0 * x).sin()).collect();
        system.set_density_derivative(&drhodt).unwrap();
        system.set_rvzero(0.07);
        system.evaluate().unwrap();

        for (j, res) in system.continuity_residual().iter().enumerate() {
            assert!(
                res.abs() < 1e-10,
                "{:?} cell {}: residual {}",
                geometry,
                j,
                res
            );
        }
    }
}

#[test]
fn test_mass_flux_constant_without_sources() {
    // drho/dt = 0, zero split constants, planar: rV is constant in x even
    // with a nonzero tangential field.
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    let u = vec![75.0; n];
    let temp = vec![300.0; n];
    let y = vec![vec![1.0; n]];
    system.set_state(&u, &temp, &y, 0.0).unwrap();
    system.set_rvzero(0.3);
    system.evaluate().unwrap();

    for j in 0..n {
        assert!((system.rv()[j] - 0.3).abs() < 1e-13);
    }
}

#[test]
fn test_left_boundary_values_preserved() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    system.set_left_bc(320.0, &[1.0]).unwrap();
    system.set_rvzero(0.1);
    system.integrate_to_time(2e-3).unwrap();

    assert_eq!(system.temperature()[0], 320.0);
    assert!((system.wmx()[0] - W_AIR).abs() < 1e-15);

    system.integrate_to_time(4e-3).unwrap();
    assert_eq!(system.temperature()[0], 320.0);
}

#[test]
fn test_species_subdomain_isolation() {
    // Perturbing a species outside its active window (with the mixture
    // weight held by a compensating species of equal molar mass) leaves
    // the post-step window values untouched.
    let n = 11;
    let run = |outside: f64| -> Vec<f64> {
        let mut system = uniform_setup(n, Geometry::Planar, 2);
        let mut y = vec![vec![0.0; n], vec![0.0; n]];
        for j in 0..n {
            y[0][j] = 0.2 + 0.03 * j as f64;
            y[1][j] = 1.0 - y[0][j];
        }
        // Node 9 lies outside species 0's window.
        y[0][9] = outside;
        y[1][9] = 1.0 - outside;
        system.set_state(&vec![0.0; n], &vec![300.0; n], &y, 0.0).unwrap();
        system.set_left_bc(300.0, &[0.2, 0.8]).unwrap();
        system.set_species_domains(&[2, 0], &[7, n - 1]).unwrap();
        system.set_rvzero(0.05);
        system.integrate_to_time(5e-3).unwrap();
        system.mass_fractions()[0][2..=7].to_vec()
    };

    let base = run(0.47);
    let perturbed = run(0.05);
    for (a, b) in base.iter().zip(&perturbed) {
        assert!((a - b).abs() < 1e-14, "{} vs {}", a, b);
    }
}

#[test]
fn test_quasi2d_matches_one_dimensional_path() {
    let n = 11;
    let tf = 3e-3;

    let step_state = |system: &mut SplitConvection| {
        let mut y = vec![vec![0.0; n], vec![0.0; n]];
        for j in 0..n {
            y[0][j] = if j < 5 { 1.0 } else { 0.0 };
            y[1][j] = 1.0 - y[0][j];
        }
        system.set_state(&vec![0.0; n], &vec![300.0; n], &y, 0.0).unwrap();
        system.set_left_bc(300.0, &[1.0, 0.0]).unwrap();
    };

    // 1D path: unit mass flux from the left boundary condition.
    let mut one_d = uniform_setup(n, Geometry::Planar, 2);
    step_state(&mut one_d);
    one_d.set_rvzero(1.0);
    one_d.integrate_to_time(tf).unwrap();

    // Quasi-2D path: constant prescribed fields v_z = 1, v_r = 0.
    let mut quasi = uniform_setup(n, Geometry::Planar, 2);
    step_state(&mut quasi);
    quasi.set_rvzero(1.0);
    quasi.setup_quasi2d(
        Arc::new(BilinearInterpolator::constant(1.0)),
        Arc::new(BilinearInterpolator::constant(0.0)),
    );
    quasi.integrate_to_time(tf).unwrap();

    for k in 0..2 {
        for j in 0..n {
            let d = one_d.mass_fractions()[k][j] - quasi.mass_fractions()[k][j];
            assert!(d.abs() < 1e-10, "species {} node {}: {}", k, j, d);
        }
    }
}

#[test]
fn test_short_window_species_is_inert() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 2);
    let mut y = vec![vec![0.5; n], vec![0.5; n]];
    y[0][4] = 0.37;
    y[1][4] = 1.0 - y[0][4];
    system.set_state(&vec![0.0; n], &vec![300.0; n], &y, 0.0).unwrap();
    system.set_left_bc(300.0, &[0.5, 0.5]).unwrap();
    system.set_species_domains(&[3, 0], &[4, n - 1]).unwrap();
    system.set_rvzero(0.2);
    system.integrate_to_time(5e-3).unwrap();

    // A two-node window integrates to no effect.
    assert!((system.mass_fractions()[0][3] - 0.5).abs() < 1e-14);
    assert!((system.mass_fractions()[0][4] - 0.37).abs() < 1e-14);
}

#[test]
fn test_setters_reject_bad_sizes_and_leave_state() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);

    assert!(system
        .set_state(&vec![0.0; n - 1], &vec![300.0; n], &[vec![1.0; n]], 0.0)
        .is_err());
    assert!(system.set_left_bc(300.0, &[1.0, 0.5]).is_err());
    assert!(system.set_species_domains(&[0], &[n]).is_err());
    assert!(system.set_density_derivative(&vec![0.0; 3]).is_err());
    assert!(system
        .set_split_constants(&vec![0.0; n], &vec![0.0; n], &[vec![0.0; 2]])
        .is_err());

    // The state installed by the setup is still intact.
    system.evaluate().unwrap();
    assert_eq!(system.temperature()[3], 300.0);
}

#[test]
fn test_step_accounting() {
    let n = 11;
    let mut system = uniform_setup(n, Geometry::Planar, 1);
    system.set_rvzero(0.1);
    system.integrate_to_time(1e-3).unwrap();
    assert!(system.n_steps() > 0);
    assert!(system.velocity_series().len() >= 2);
}
