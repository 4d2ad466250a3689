use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use crate::context::CiContext;
use crate::output;
use crate::trigger::{PipelineTrigger, Target};

#[derive(Parser)]
#[command(name = "citrig")]
#[command(author, version, about = "Downstream Pipeline Trigger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a package build on omnibus-gitlab-mirror and wait for it
    Omnibus {
        /// Downstream job to follow instead of the whole pipeline
        #[arg(short, long, default_value = "Trigger:qa-test")]
        job: String,
    },
    /// Trigger an image build on CNG-mirror and wait for it
    Cng,
    /// Trigger a documentation review app build and wait for it
    Docs,
    /// Stop the documentation review app of the current ref
    DocsCleanup,
    /// Trigger a database testing pipeline and report back on the merge request
    DatabaseTesting,
}

impl Cli {
    async fn trigger_and_wait(target: Target, job: Option<&str>, wait: bool) -> Result<()> {
        let trigger = PipelineTrigger::new(target, CiContext::from_env())?;

        let outcome = trigger.invoke(job).await?;
        output::print_outcome(&outcome);

        if wait {
            trigger.wait(&outcome).await?;
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Omnibus { job } => {
                info!("Triggering the omnibus package build");
                Self::trigger_and_wait(Target::Omnibus, Some(job.as_str()), true).await
            }
            Commands::Cng => {
                info!("Triggering the cloud-native image build");
                Self::trigger_and_wait(Target::Cng, None, true).await
            }
            Commands::Docs => {
                info!("Triggering the documentation review app");
                Self::trigger_and_wait(Target::Docs, None, true).await
            }
            Commands::DocsCleanup => {
                info!("Stopping the documentation review app");
                let trigger = PipelineTrigger::new(Target::Docs, CiContext::from_env())?;
                trigger.cleanup_review_app().await?;

                Ok(())
            }
            Commands::DatabaseTesting => {
                info!("Triggering the database testing pipeline");
                Self::trigger_and_wait(Target::DatabaseTesting, None, false).await
            }
        }
    }
}
