use approx::assert_relative_eq;
use pnflow::network::NetworkView;
use pnflow::solver::{
    net_rate, BandedLu, LinearSolver, LinearSystemBuilder, Param, SolverState, StandardKinetics,
};
use pnflow::{Network, PnflowError, PropertyProvider, PropertyStore, ReactiveTransport, TransportSettings};

const G: f64 = 1e-15;

fn cube() -> (Network, PropertyStore) {
    let net = Network::cubic([9, 9, 9]).unwrap();
    let mut phase = PropertyStore::for_network(&net);
    phase
        .set("throat.diffusive_conductance", vec![G; net.num_throats()])
        .unwrap();
    (net, phase)
}

fn settings() -> TransportSettings {
    TransportSettings::default()
        .with_tolerance(1e-10)
        .with_max_iter(5000)
        .with_relaxation(1.0, 1.0)
}

#[test]
fn test_one_value_one_source() {
    let (net, mut phase) = cube();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_source(
        &net.pores("bottom").unwrap(),
        "pore.reaction",
        StandardKinetics::new(-1e-15, 2.0),
    )
    .unwrap();
    alg.set_value_bc(&net.pores("top").unwrap(), 1.0).unwrap();

    let result = alg.run(&mut phase, None).unwrap();
    assert!(result.is_converged());
    assert_eq!(alg.state(), SolverState::Converged);
    assert_relative_eq!(result.mean(), 0.648268, max_relative = 1e-6);

    let published = phase.get("pore.concentration").unwrap();
    assert_relative_eq!(
        published.iter().sum::<f64>() / published.len() as f64,
        0.648268,
        max_relative = 1e-6
    );
}

#[test]
fn test_per_pore_kinetics_from_properties() {
    let (net, mut phase) = cube();
    let all = phase
        .add_domain("bulk", (0..net.num_pores()).collect(), Vec::new())
        .unwrap();
    phase.set_domain_uniform(all, "pore.A", -1e-15).unwrap();
    phase.set_domain_uniform(all, "pore.k", 2.0).unwrap();

    let kinetics = StandardKinetics::new(
        Param::from_provider(&mut phase, "pore.A").unwrap(),
        Param::from_provider(&mut phase, "pore.k").unwrap(),
    );
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_source(&net.pores("bottom").unwrap(), "pore.reaction", kinetics)
        .unwrap();
    alg.set_value_bc(&net.pores("top").unwrap(), 1.0).unwrap();

    let result = alg.run(&mut phase, None).unwrap();
    assert_relative_eq!(result.mean(), 0.648268, max_relative = 1e-6);
}

#[test]
fn test_mass_balance() {
    let (net, mut phase) = cube();
    let bottom = net.pores("bottom").unwrap();
    let top = net.pores("top").unwrap();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_source(&bottom, "pore.reaction", StandardKinetics::new(-1e-15, 2.0))
        .unwrap();
    alg.set_value_bc(&top, 1.0).unwrap();
    let result = alg.run(&mut phase, None).unwrap();

    let conductance = phase.get("throat.diffusive_conductance").unwrap();
    let supplied = net_rate(&net, &conductance, &result.solution, &top).unwrap();
    let rates = phase.get("pore.reaction.rate").unwrap();
    let consumed: f64 = bottom.iter().map(|&p| rates[p]).sum();

    assert!(supplied > 0.0);
    assert!(consumed < 0.0);
    assert_relative_eq!(supplied, -consumed, max_relative = 1e-6);
    // Only the source pores report a rate
    assert_eq!(rates[net.pores("internal").unwrap()[0]], 0.0);
}

#[test]
fn test_linear_case_matches_direct_solve() {
    let (net, mut phase) = cube();
    let left = net.pores("left").unwrap();
    let right = net.pores("right").unwrap();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_value_bc(&left, 1.0).unwrap();
    alg.set_value_bc(&right, 0.5).unwrap();
    let result = alg.run(&mut phase, None).unwrap();
    assert_eq!(result.iterations, 1);
    assert!(result.is_converged());

    let conductance = phase.get("throat.diffusive_conductance").unwrap();
    let mut system = LinearSystemBuilder::new(&net).build(&conductance).unwrap();
    alg.boundary_conditions().apply(&mut system);
    let direct = BandedLu::new().solve(&system).unwrap();
    for (x, d) in result.solution.iter().zip(&direct) {
        assert_relative_eq!(*x, *d, epsilon = 1e-12);
    }

    // Linear profile across y
    for (p, &x) in result.solution.iter().enumerate() {
        let j = (p / 9) % 9;
        assert_relative_eq!(x, 1.0 - 0.5 * j as f64 / 8.0, epsilon = 1e-9);
    }
    for &p in &left {
        assert_eq!(result.solution[p], 1.0);
    }
}

#[test]
fn test_source_over_bcs() {
    let (net, _) = cube();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_value_bc(&net.pores("left").unwrap(), 1.0).unwrap();
    alg.set_value_bc(&net.pores("right").unwrap(), 0.5).unwrap();
    let err = alg
        .set_source(
            &net.pores_any(&["left", "right"]).unwrap(),
            "pore.reaction",
            StandardKinetics::new(-1e-15, 2.0),
        )
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn test_bcs_over_source() {
    let (net, _) = cube();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_source(
        &net.pores("left").unwrap(),
        "pore.reaction",
        StandardKinetics::new(-1e-15, 2.0),
    )
    .unwrap();
    let err = alg
        .set_value_bc(&net.pores("left").unwrap(), 1.0)
        .unwrap_err();
    assert!(matches!(err, PnflowError::Conflict { .. }));
}

#[test]
fn test_source_over_source() {
    let (net, _) = cube();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    let left = net.pores("left").unwrap();
    alg.set_source(&left, "pore.reaction", StandardKinetics::new(-1e-15, 2.0))
        .unwrap();
    let err = alg
        .set_source(&left, "pore.another_reaction", StandardKinetics::new(-1e-15, 2.0))
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(alg.sources().len(), 1);
}

#[test]
fn test_conductance_regenerated_per_domain() {
    // Two domains split the throats; each derives its conductance from a
    // local scale factor
    let net = Network::cubic([3, 3, 3]).unwrap();
    let mut phase = PropertyStore::for_network(&net);
    let half = net.num_throats() / 2;
    let a = phase.add_domain("a", Vec::new(), (0..half).collect()).unwrap();
    let b = phase
        .add_domain("b", Vec::new(), (half..net.num_throats()).collect())
        .unwrap();
    phase.set_domain_uniform(a, "throat.scale", 2.0).unwrap();
    phase.set_domain_uniform(b, "throat.scale", 2.0).unwrap();
    for domain in [a, b] {
        phase
            .add_model(domain, "throat.diffusive_conductance", |inputs| {
                Ok(inputs.lookup("throat.scale")?.iter().map(|s| s * G).collect())
            })
            .unwrap();
    }
    assert!(phase.get("throat.diffusive_conductance").is_none());

    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_value_bc(&net.pores("bottom").unwrap(), 1.0).unwrap();
    alg.set_value_bc(&net.pores("top").unwrap(), 0.0).unwrap();
    let result = alg.run(&mut phase, None).unwrap();

    let conductance = phase.get("throat.diffusive_conductance").unwrap();
    assert!(conductance.iter().all(|&g| g == 2.0 * G));
    for (p, &x) in result.solution.iter().enumerate() {
        let k = p % 3;
        assert_relative_eq!(x, 1.0 - 0.5 * k as f64, epsilon = 1e-9);
    }
}

#[test]
fn test_under_relaxation_reaches_same_solution() {
    let (net, mut phase) = cube();
    let relaxed = settings().with_relaxation(0.5, 0.5);
    let mut alg = ReactiveTransport::new(&net, relaxed).unwrap();
    alg.set_source(
        &net.pores("bottom").unwrap(),
        "pore.reaction",
        StandardKinetics::new(-1e-15, 2.0),
    )
    .unwrap();
    alg.set_value_bc(&net.pores("top").unwrap(), 1.0).unwrap();
    let result = alg.run(&mut phase, None).unwrap();
    assert!(result.is_converged());
    assert!(result.iterations > 5);
    assert_relative_eq!(result.mean(), 0.648268, max_relative = 1e-6);
}

#[test]
fn test_rerun_from_previous_solution() {
    let (net, mut phase) = cube();
    let mut alg = ReactiveTransport::new(&net, settings()).unwrap();
    alg.set_source(
        &net.pores("bottom").unwrap(),
        "pore.reaction",
        StandardKinetics::new(-1e-15, 2.0),
    )
    .unwrap();
    alg.set_value_bc(&net.pores("top").unwrap(), 1.0).unwrap();
    let first = alg.run(&mut phase, None).unwrap();
    let second = alg.run(&mut phase, Some(first.solution.as_slice())).unwrap();
    assert!(second.iterations <= 2);
    assert_relative_eq!(second.mean(), first.mean(), max_relative = 1e-9);
}
