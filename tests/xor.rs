//! End-to-end XOR convergence across every gradient-based training
//! algorithm, exercising the public API the way a caller would use it.

use cascade_net::{ActivationFunc, CallbackControl, Network, TrainingAlgorithm, TrainingData};

fn xor_data() -> TrainingData<f64> {
    TrainingData::create_train(
        vec![vec![-1.0, -1.0], vec![-1.0, 1.0], vec![1.0, -1.0], vec![1.0, 1.0]],
        vec![vec![-1.0], vec![1.0], vec![1.0], vec![-1.0]],
    )
    .unwrap()
}

fn symmetric_net() -> Network<f64> {
    let mut net = Network::create_standard(&[2, 3, 1]).unwrap();
    net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
    net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
    net
}

#[test]
fn rprop_converges_on_xor_within_desired_error() {
    let mut net = symmetric_net();
    net.training_algorithm = TrainingAlgorithm::RProp;
    let data = xor_data();

    let epochs = net
        .train_on_data(&data, 1000, 0, 0.05, |_, _| CallbackControl::Continue)
        .unwrap();

    assert!(net.get_mse() <= 0.05, "mse {} after {epochs} epochs", net.get_mse());

    for i in 0..data.length() {
        let input = data.input(i).unwrap();
        let expected = data.output(i).unwrap()[0];
        let out = net.run(input).unwrap()[0];
        assert!(
            (out > 0.0) == (expected > 0.0),
            "input {input:?} expected sign {expected} got {out}"
        );
    }
}

#[test]
fn quickprop_converges_on_xor() {
    let mut net = symmetric_net();
    net.training_algorithm = TrainingAlgorithm::Quickprop;
    net.learning_rate = 0.7;
    let data = xor_data();

    net.train_on_data(&data, 2000, 0, 0.05, |_, _| CallbackControl::Continue)
        .unwrap();

    assert!(net.get_mse() <= 0.1, "mse {} did not converge", net.get_mse());
}

#[test]
fn sparse_network_trains_without_every_edge_present() {
    let mut net = Network::<f64>::create_sparse(0.6, &[2, 4, 1]).unwrap();
    net.set_activation_function_hidden(ActivationFunc::SigmoidSymmetric);
    net.set_activation_function_output(ActivationFunc::SigmoidSymmetric);
    net.training_algorithm = TrainingAlgorithm::RProp;
    let data = xor_data();

    let initial = net.train_epoch(&data).unwrap();
    for _ in 0..400 {
        net.train_epoch(&data).unwrap();
    }
    let later = net.train_epoch(&data).unwrap();
    assert!(later < initial, "sparse network failed to reduce MSE: {initial} -> {later}");
}

#[test]
fn test_data_reports_mse_without_mutating_weights() {
    let mut net = symmetric_net();
    net.training_algorithm = TrainingAlgorithm::RProp;
    let data = xor_data();

    net.train_on_data(&data, 500, 0, 0.05, |_, _| CallbackControl::Continue)
        .unwrap();
    let weights_before = net.get_weights();

    let mse = net.test_data(&data).unwrap();
    assert!(mse.is_finite());
    assert_eq!(net.get_weights(), weights_before);
}
