// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Walks the member/manager/admin permission set: per-role decisions and the
//! conditions a role's rules compile to.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loom_acl_core::{
	build_ability, Ability, BuildOptions, CoarseCheck, Placeholder, SqlOptions, Subject,
};
use tracing_subscriber::EnvFilter;

mod defines;

use defines::{permissions, sample_users, user_with_role, ACTIONS, ROLES, USER};

#[derive(Parser, Debug)]
#[command(
	name = "loom-acl-demo",
	about = "Role-based capability checks on a sample user directory",
	version
)]
struct Args {
	/// Build abilities whose conditioned rules always match
	#[arg(long, global = true)]
	skip_conditions: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print what each role may do to each sample user
	Roles {
		/// Limit output to one role
		#[arg(long)]
		role: Option<String>,
	},
	/// Check one action against one sample user
	Check {
		#[arg(long)]
		role: String,
		#[arg(long)]
		action: String,
		/// Sample user label, e.g. "manager other"; omit for a type-level check
		#[arg(long)]
		target: Option<String>,
	},
	/// Print the conditions a role's rules compile to
	Conditions {
		#[arg(long)]
		role: String,
		#[arg(long)]
		action: String,
		#[arg(long, default_value = USER)]
		subject: String,
		#[arg(long, value_enum, default_value_t = Format::Sql)]
		format: Format,
		/// Placeholder style; defaults to the configured one
		#[arg(long)]
		placeholder: Option<Placeholder>,
	},
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
	Ast,
	Sql,
	Mongo,
}

fn ability_for(role: &str, options: BuildOptions) -> Result<Ability> {
	let user = user_with_role(role).ok_or_else(|| anyhow!("unknown role: {role}"))?;
	Ok(build_ability(&user.actor(), &[permissions()], options))
}

fn verdict(allowed: bool) -> &'static str {
	if allowed {
		"can"
	} else {
		"can not"
	}
}

fn coarse_verdict(check: CoarseCheck) -> &'static str {
	match check {
		CoarseCheck::Conclusive(true) => "can",
		CoarseCheck::NeedsInstance => "can (with conditions)",
		CoarseCheck::Conclusive(false) | CoarseCheck::NoRules => "can not",
	}
}

fn print_roles(only: Option<&str>, options: BuildOptions) -> Result<()> {
	let targets = sample_users();
	for role in ROLES.iter().filter(|role| only.map_or(true, |only| only == **role)) {
		let ability = ability_for(role, options)?;
		println!("{role} abilities:");
		for action in ACTIONS {
			println!("- {}", action.as_str().to_uppercase());
			println!(
				"  {role} {} {action} {USER}",
				coarse_verdict(ability.coarse_check(action.as_str(), USER))
			);
			for target in &targets {
				let allowed = ability.can(action.as_str(), Subject::from_value(USER, &target.record));
				println!("  {role} {} {action} {}", verdict(allowed), target.label);
			}
		}
		println!();
	}
	Ok(())
}

fn print_check(role: &str, action: &str, target: Option<&str>, options: BuildOptions) -> Result<()> {
	let ability = ability_for(role, options)?;
	let (allowed, rule) = match target {
		Some(label) => {
			let user = sample_users()
				.into_iter()
				.find(|user| user.label == label)
				.ok_or_else(|| anyhow!("unknown sample user: {label}"))?;
			let subject = Subject::from_value(USER, &user.record);
			(
				ability.can(action, subject),
				ability.relevant_rule_for(action, subject).cloned(),
			)
		}
		None => (
			ability.can(action, USER),
			ability.relevant_rule_for(action, USER).cloned(),
		),
	};

	println!("{role} {} {action} {}", verdict(allowed), target.unwrap_or(USER));
	match rule {
		Some(rule) => println!(
			"decided by: {}",
			serde_json::to_string(&rule).context("serializing rule")?
		),
		None => println!("decided by: no matching rule"),
	}
	Ok(())
}

fn print_conditions(
	role: &str,
	action: &str,
	subject: &str,
	format: Format,
	placeholder: Option<Placeholder>,
	options: BuildOptions,
) -> Result<()> {
	let ability = ability_for(role, options)?;
	let Some(query) = ability.conditions_for(action, subject) else {
		println!("no rules for {role} to {action} {subject}");
		return Ok(());
	};

	match format {
		Format::Ast => println!("{}", serde_json::to_string_pretty(&query.to_ast())?),
		Format::Mongo => println!("{}", serde_json::to_string_pretty(&query.to_mongo())?),
		Format::Sql => {
			let placeholder = match placeholder {
				Some(placeholder) => placeholder,
				None => loom_server_acl::load_config()?.sql_placeholder,
			};
			let fragment = query.to_sql_with(&SqlOptions::new(placeholder));
			println!("{}", fragment.clause);
			println!("params: {}", serde_json::to_string(&fragment.params)?);
			for residual in &fragment.residuals {
				println!(
					"residual: {} {} {}",
					residual.field,
					if residual.negated { "not" } else { "is" },
					residual.predicate
				);
			}
		}
	}
	Ok(())
}

fn main() -> Result<()> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let options = BuildOptions {
		skip_conditions: args.skip_conditions,
	};
	tracing::debug!(?options, "building demo abilities");

	match args.command {
		Command::Roles { role } => print_roles(role.as_deref(), options),
		Command::Check {
			role,
			action,
			target,
		} => print_check(&role, &action, target.as_deref(), options),
		Command::Conditions {
			role,
			action,
			subject,
			format,
			placeholder,
		} => print_conditions(&role, &action, &subject, format, placeholder, options),
	}
}
