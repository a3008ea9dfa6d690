use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gsn_engine::config::{DEFAULT_INDENT, DEFAULT_MODEL_FOLDER, SerializeOptions};
use gsn_engine::edit::{self, AttrValue, Change, EditBatch};
use gsn_engine::model::{ModelErrors, RawNode};
use gsn_engine::{Model, Result, View, diagnostics, text};

use anyhow::{Context, bail};

#[derive(Parser)]
#[command(name = "gsn-engine")]
#[command(about = "GSN assurance-case model checker and converter", long_about = None)]
struct Cli {
    /// Debug logging (overrides GSN_LOG / RUST_LOG).
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON model into a folder of .gsn files.
    ToGsn {
        model: String,

        /// Directory the model folder is created in.
        #[arg(short = 'o', long, default_value = ".")]
        out: PathBuf,

        #[arg(short = 'm', long, default_value = DEFAULT_MODEL_FOLDER)]
        model_folder: String,

        /// Write every namespace into main.gsn.
        #[arg(short = 's', long)]
        single_file: bool,

        #[arg(short = 'i', long, default_value_t = DEFAULT_INDENT)]
        indent: usize,
    },

    /// Parse .gsn files back into a JSON model.
    ToJson {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// Report structural, referential and cycle errors.
    Check { model: String },

    /// List the nodes visible under a view expression.
    View {
        model: String,

        #[arg(short = 'e', long, default_value = "")]
        expression: String,

        /// Label definitions (JSON array); defaults to none.
        #[arg(long)]
        labels: Option<String>,

        #[arg(long)]
        parents: bool,

        #[arg(long)]
        subtrees: bool,
    },

    /// Print the change-set that deletes a node.
    DeletePlan { model: String, node_id: String },

    /// Rename a node, cascading to descendants and references.
    Rename {
        model: String,
        node_id: String,
        new_name: String,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// Apply a change-set atomically.
    Apply {
        model: String,
        changes: String,

        /// Reject the change-set unless the model still has this hash.
        #[arg(long)]
        base_hash: Option<String>,

        #[arg(short = 'o', long)]
        out: Option<String>,
    },

    /// Print the content hash of a model.
    Hash { model: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    diagnostics::init_logging(cli.verbose);

    match cli.cmd {
        Commands::ToGsn {
            model,
            out,
            model_folder,
            single_file,
            indent,
        } => {
            // 1) Read raw records; validation happens inside the serializer.
            let records = read_records(&model)?;

            // 2) Serialize, printing every collected model error on failure.
            let contents = match text::to_text(&records, indent) {
                Ok(contents) => contents,
                Err(errors) => return report_model_errors(&errors, cli.verbose),
            };

            // 3) Write the model folder.
            let opts = SerializeOptions {
                indent,
                model_folder,
                single_file,
            };
            for path in opts.write_model_folder(&contents, &out)? {
                println!("Wrote {}", path.display());
            }
        }

        Commands::ToJson { files, out } => {
            let texts = files
                .iter()
                .map(|f| std::fs::read_to_string(f).with_context(|| format!("read {}", f)))
                .collect::<Result<Vec<_>>>()?;
            let model = text::from_text(&texts)?;
            write_output(&model.to_json_pretty()?, out.as_deref())?;
        }

        Commands::Check { model } => {
            let records = read_records(&model)?;
            match text::populate_namespaces(&records) {
                Ok(namespaces) => println!(
                    "OK: {} node(s) in {} namespace(s)",
                    records.len(),
                    namespaces.len()
                ),
                Err(errors) => return report_model_errors(&errors, cli.verbose),
            }
        }

        Commands::View {
            model,
            expression,
            labels,
            parents,
            subtrees,
        } => {
            let model = Model::from_path(&model)?;
            let labels = match labels {
                Some(path) => gsn_engine::config::read_list(Path::new(&path))?,
                None => Vec::new(),
            };

            let check = gsn_engine::view::check_view_expression(&expression, &labels);
            if !check.valid {
                bail!("{}", diagnostics::with_hint("invalid view expression", &check.hint));
            }

            let view = View {
                include_parents: parents,
                include_subtrees: subtrees,
                ..View::new(expression)
            };
            for node in gsn_engine::apply_view(model.nodes(), &labels, &view)? {
                println!("{}", node.id);
            }
        }

        Commands::DeletePlan { model, node_id } => {
            let model = Model::from_path(&model)?;
            let changes = edit::delete_implications(model.nodes(), &node_id)?;
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }

        Commands::Rename {
            model,
            node_id,
            new_name,
            out,
        } => {
            let model = Model::from_path(&model)?;
            let change = Change::AttributeChange {
                node_id,
                attr: "name".to_string(),
                new_value: AttrValue::Text(new_name),
            };
            let renamed = edit::apply_changes(&model, std::slice::from_ref(&change))?;
            tracing::debug!("{}", change.describe());
            write_output(&renamed.to_json_pretty()?, out.as_deref())?;
        }

        Commands::Apply {
            model,
            changes,
            base_hash,
            out,
        } => {
            let model = Model::from_path(&model)?;
            let changes: Vec<Change> = serde_json::from_str(
                &std::fs::read_to_string(&changes).with_context(|| format!("read {}", changes))?,
            )
            .context("change-set is not a JSON list of commands")?;

            let batch = EditBatch {
                base_hash: base_hash.unwrap_or_else(|| edit::model_hash(&model)),
                changes,
            };
            let next = edit::apply_batch(&model, &batch)?;
            write_output(&next.to_json_pretty()?, out.as_deref())?;
        }

        Commands::Hash { model } => {
            let model = Model::from_path(&model)?;
            println!("{}", edit::model_hash(&model));
        }
    }

    Ok(())
}

fn read_records(path: &str) -> Result<Vec<RawNode>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read model file {}", path))?;
    serde_json::from_str(&text)
        .context("model json is not an array of nodes")
}

fn report_model_errors(errors: &ModelErrors, verbose: bool) -> Result<()> {
    for error in errors.iter() {
        println!("{}\n", error.report(verbose));
    }
    bail!("{} model error(s)", errors.0.len())
}

fn write_output(json: &str, out: Option<&str>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("write {}", path))?;
            println!("Wrote {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
