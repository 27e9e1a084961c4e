use structlearn::task::{Argmax, AssignmentInput, AssignmentModel, AssignmentOutput};
use structlearn::train::Trainer;
use structlearn::{SparseModel, Structure};

const F1: u32 = 1;
const F2: u32 = 2;

fn single_choice() -> (AssignmentInput, AssignmentOutput) {
    (
        AssignmentInput::new(vec![vec![vec![F2], vec![F1]]]),
        AssignmentOutput::new(vec![1]),
    )
}

fn model_with(weights: Vec<(u32, f64)>) -> AssignmentModel {
    AssignmentModel::from_parameters(SparseModel::from_parameters(weights))
}

#[test]
fn test_away_from_worse_pushes_margin() {
    let (input, correct) = single_choice();
    // Already correct, but only by a margin of 1
    let mut trainer = Trainer::away_from_worse(model_with(vec![(F1, 1.0)]), Argmax)
        .with_loss_weight(2.0)
        .unwrap();

    let mut predicted = correct.create_new();
    let loss = trainer.train_example(&input, &correct, &mut predicted).unwrap();
    assert_eq!(predicted, correct);
    // The update moves toward the prediction, away from the high-loss choice
    assert_eq!(loss, 1.0);
    assert_eq!(trainer.model().params().weight(F1), 2.0);
    assert_eq!(trainer.model().params().weight(F2), -1.0);
    assert_eq!(trainer.iteration(), 1);
}

#[test]
fn test_away_from_worse_within_margin() {
    let (input, correct) = single_choice();
    let mut trainer = Trainer::away_from_worse(model_with(vec![(F1, 1.0)]), Argmax)
        .with_loss_weight(0.5)
        .unwrap();

    let mut predicted = correct.create_new();
    let loss = trainer.train_example(&input, &correct, &mut predicted).unwrap();
    assert_eq!(loss, 0.0);
    assert_eq!(trainer.model().params().weight(F1), 1.0);
    assert_eq!(trainer.model().params().weight(F2), 0.0);
    assert_eq!(trainer.iteration(), 1);
}

#[test]
fn test_toward_better_moves_to_low_loss() {
    let (input, correct) = single_choice();
    let mut trainer = Trainer::toward_better(AssignmentModel::new(), Argmax);

    let mut predicted = correct.create_new();
    let loss = trainer.train_example(&input, &correct, &mut predicted).unwrap();
    assert_eq!(predicted, AssignmentOutput::new(vec![0]));
    assert_eq!(loss, 1.0);
    assert_eq!(trainer.model().params().weight(F1), 1.0);
    assert_eq!(trainer.model().params().weight(F2), -1.0);
}

#[test]
fn test_toward_better_keeps_confident_mistake() {
    let (input, correct) = single_choice();
    // The wrong candidate wins by more than the loss weight, so the better
    // structure is the prediction itself and nothing changes.
    let mut trainer = Trainer::toward_better(model_with(vec![(F2, 5.0)]), Argmax);

    let mut predicted = correct.create_new();
    let loss = trainer.train_example(&input, &correct, &mut predicted).unwrap();
    assert_eq!(predicted, AssignmentOutput::new(vec![0]));
    assert_eq!(loss, 0.0);
    assert_eq!(trainer.model().params().weight(F2), 5.0);
    assert_eq!(trainer.model().params().weight(F1), 0.0);
}

#[test]
fn test_loss_weight_by_name() {
    let mut trainer = Trainer::toward_better(AssignmentModel::new(), Argmax);
    assert_eq!(trainer.get("loss_weight").unwrap(), "1");
    trainer.set("loss_weight", "0.5").unwrap();
    assert_eq!(trainer.rule_params().loss_weight(), 0.5);

    let result = trainer.set("loss_weight", "-1");
    assert_eq!(
        result.unwrap_err().to_string(),
        "loss_weight must be non-negative"
    );

    let mut plain = Trainer::perceptron(AssignmentModel::new(), Argmax);
    assert!(plain.set("loss_weight", "0.5").is_err());
}
