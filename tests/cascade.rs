//! Cascade-Correlation growth on a small parity problem, exercising the
//! public growth API end to end.

use cascade_net::{ActivationFunc, CallbackControl, Network, TrainingAlgorithm, TrainingData};

fn parity_data(bits: usize) -> TrainingData<f64> {
    let rows = 1usize << bits;
    let mut inputs = Vec::with_capacity(rows);
    let mut outputs = Vec::with_capacity(rows);
    for pattern in 0..rows {
        let input: Vec<f64> = (0..bits)
            .map(|b| if pattern & (1 << b) != 0 { 1.0 } else { -1.0 })
            .collect();
        let parity = (0..bits).filter(|b| pattern & (1 << b) != 0).count() % 2;
        outputs.push(vec![if parity == 1 { 1.0 } else { -1.0 }]);
        inputs.push(input);
    }
    TrainingData::create_train(inputs, outputs).unwrap()
}

#[test]
fn cascade_growth_reduces_error_on_three_bit_parity() {
    let data = parity_data(3);
    let mut net = Network::<f64>::create_shortcut(&[3, 1]).unwrap();
    net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
    net.training_algorithm = TrainingAlgorithm::RProp;
    net.cascade_params.max_out_epochs = 30;
    net.cascade_params.max_cand_epochs = 30;
    net.cascade_params.min_out_epochs = 5;
    net.cascade_params.min_cand_epochs = 5;
    net.cascade_params.candidate_activation_functions =
        vec![ActivationFunc::SigmoidSymmetric, ActivationFunc::ElliotSymmetric];
    net.cascade_params.candidate_activation_steepnesses = vec![0.5, 1.0];
    net.cascade_params.num_candidate_groups = 1;

    let initial_mse = net.test_data(&data).unwrap();

    net.cascadetrain_on_data(&data, 4, 0, 0.01, |_, _, _| CallbackControl::Continue)
        .unwrap();

    let final_mse = net.test_data(&data).unwrap();
    assert!(net.total_neurons() > 3 + 1, "expected at least one cascade neuron to be installed");
    assert!(
        final_mse < initial_mse,
        "cascade growth did not improve MSE: {initial_mse} -> {final_mse}"
    );
}

#[test]
fn cascade_refuses_layered_topology() {
    let data = parity_data(2);
    let mut net = Network::<f64>::create_standard(&[2, 1]).unwrap();
    net.training_algorithm = TrainingAlgorithm::RProp;
    let err = net
        .cascadetrain_on_data(&data, 2, 0, 0.01, |_, _, _| CallbackControl::Continue)
        .unwrap_err();
    assert!(format!("{err}").contains("shortcut"));
}
