use std::fs;
use std::path::Path;

use digits::{
    classifier::{evaluate, Classifier},
    config::{Config, DataConfig, PoolFormat},
    dataset::{preprocess, Partitions},
    error::DatasetError,
    logistic_regression::{mean_final_loss, OneVsRestLogistic},
    parse::{CsvDirectory, MatArchive, PoolSource},
    plot,
    softmax_regression::SoftmaxRegression,
    support_vector_machine::SupportVectorMachine,
    weights,
};
use env_logger::Env;

fn open_source(config: &DataConfig) -> Result<Box<dyn PoolSource>, DatasetError> {
    match config.format {
        PoolFormat::Mat => Ok(Box::new(MatArchive::open(&config.path)?)),
        PoolFormat::Csv => Ok(Box::new(CsvDirectory::new(config.path.clone()))),
    }
}

fn print_header(name: &str) {
    println!("\n\n--------------{name}-------------------\n\n");
}

fn report(classifier: &dyn Classifier, partitions: &Partitions) -> digits::Result<()> {
    println!("{}", evaluate(classifier, partitions)?);
    Ok(())
}

fn plot_into(
    plot_dir: Option<&Path>,
    file_name: &str,
    title: &str,
    curves: &[(String, Vec<f64>)],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = plot_dir else {
        return Ok(());
    };
    fs::create_dir_all(dir)?;
    plot::draw_curves(&dir.join(file_name), title, curves)?;
    Ok(())
}

fn per_class_curves(histories: Vec<Vec<f64>>) -> Vec<(String, Vec<f64>)> {
    histories
        .into_iter()
        .enumerate()
        .map(|(class, losses)| (format!("class {class}"), losses))
        .collect()
}

fn logistic_model(
    config: &Config,
    partitions: &Partitions,
) -> Result<OneVsRestLogistic, Box<dyn std::error::Error>> {
    let path = config.logistic_weights();
    let (rows, cols) = (partitions.n_features() + 1, config.data.n_classes);

    if path.exists() || !config.logistic.train_if_missing {
        return Ok(OneVsRestLogistic::new(weights::load(&path, rows, cols)?));
    }

    log::info!(
        "{} not found, training one-vs-rest logistic regression",
        path.display()
    );
    let train = &partitions.train;
    let (model, histories) = OneVsRestLogistic::train(
        train.data.view(),
        train.labels.view(),
        cols,
        &config.logistic.optimizer.into(),
    )?;
    log::info!("mean final loss {:.6}", mean_final_loss(&histories));
    weights::save(&path, model.weights())?;

    plot_into(
        config.plot_dir.as_deref(),
        "blr_loss.png",
        "one-vs-rest logistic regression",
        &per_class_curves(histories),
    )?;
    Ok(model)
}

fn softmax_model(
    config: &Config,
    partitions: &Partitions,
) -> Result<SoftmaxRegression, Box<dyn std::error::Error>> {
    let path = config.softmax_weights();
    let (rows, cols) = (partitions.n_features() + 1, config.data.n_classes);

    if path.exists() || !config.softmax.train_if_missing {
        return Ok(SoftmaxRegression::new(weights::load(&path, rows, cols)?));
    }

    log::info!("{} not found, training softmax regression", path.display());
    let train = &partitions.train;
    let (model, losses) = SoftmaxRegression::train(
        train.data.view(),
        train.labels.view(),
        cols,
        &config.softmax.optimizer.into(),
    )?;
    weights::save(&path, model.weights())?;

    plot_into(
        config.plot_dir.as_deref(),
        "mlr_loss.png",
        "softmax regression",
        &[("softmax".to_owned(), losses)],
    )?;
    Ok(model)
}

fn run_svm(config: &Config, partitions: &Partitions) -> Result<(), Box<dyn std::error::Error>> {
    let sample = partitions.train.subsample(config.svm.max_samples);
    log::info!(
        "fitting support vector machines on {} of {} training rows",
        sample.len(),
        partitions.train.len()
    );

    for (index, run) in config.svm.runs.iter().enumerate() {
        println!("\n{} - C = {}\n", run.kernel, run.regularization);

        let (machine, risks) = SupportVectorMachine::fit(
            sample.data.view(),
            sample.labels.view(),
            config.data.n_classes,
            run.kernel,
            &config.svm.solver(run.regularization),
        )?;
        report(&machine, partitions)?;

        plot_into(
            config.plot_dir.as_deref(),
            &format!("svm_{index}_risk.png"),
            &format!("{} - C = {}", machine.kernel(), run.regularization),
            &per_class_curves(risks),
        )?;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::discover()?;
    let source = open_source(&config.data)?;
    let partitions = preprocess(source.as_ref(), &config.data)?;

    print_header("BLR");
    let logistic = logistic_model(&config, &partitions)?;
    report(&logistic, &partitions)?;

    if config.svm.enabled {
        print_header("SVM");
        run_svm(&config, &partitions)?;
    }

    print_header("MLR");
    let softmax = softmax_model(&config, &partitions)?;
    report(&softmax, &partitions)?;

    Ok(())
}
