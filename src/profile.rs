use anyhow::{bail, Result};
use dialoguer::{Input, Select};

use advisor_core::types::InvestorProfile;

pub const EXPERIENCE_OPTIONS: [&str; 6] = [
    "0-1 year",
    "1-3 years",
    "3-5 years",
    "5-10 years",
    "10-20 years",
    "20+ years",
];

/// Age brackets "20-24 years" through "100-104 years".
pub fn age_options() -> Vec<String> {
    (20..=100)
        .step_by(5)
        .map(|start| format!("{}-{} years", start, start + 4))
        .collect()
}

/// Profile fields given on the command line.
#[derive(Debug, Default, Clone)]
pub struct ProfileArgs {
    pub amount: Option<f64>,
    pub age: Option<String>,
    pub experience: Option<String>,
    pub target: Option<f64>,
}

impl ProfileArgs {
    /// Build a profile from flags, falling back to the form defaults.
    pub fn into_profile(self) -> Result<InvestorProfile> {
        let profile = InvestorProfile {
            total_investable_amount: self.amount.unwrap_or(50000.0),
            age: self.age.unwrap_or_else(|| age_options()[3].clone()),
            stock_investment_experience_years: self
                .experience
                .unwrap_or_else(|| EXPERIENCE_OPTIONS[3].to_string()),
            target_amount: self.target.unwrap_or(70000.0),
        };
        check(&profile)?;
        Ok(profile)
    }
}

/// Ask for each profile field on the terminal.
pub fn prompt(defaults: ProfileArgs) -> Result<InvestorProfile> {
    let amount: f64 = Input::new()
        .with_prompt("Total investable amount (USD)")
        .default(defaults.amount.unwrap_or(50000.0))
        .interact_text()?;

    let ages = age_options();
    let age = Select::new()
        .with_prompt("Age")
        .items(&ages[..])
        .default(default_index(&ages, defaults.age.as_deref(), 3))
        .interact()?;

    let experience = Select::new()
        .with_prompt("Stock investment experience")
        .items(&EXPERIENCE_OPTIONS[..])
        .default(default_index(
            &EXPERIENCE_OPTIONS,
            defaults.experience.as_deref(),
            3,
        ))
        .interact()?;

    let target: f64 = Input::new()
        .with_prompt("Target amount after one year (USD)")
        .default(defaults.target.unwrap_or(70000.0))
        .interact_text()?;

    let profile = InvestorProfile {
        total_investable_amount: amount,
        age: ages[age].clone(),
        stock_investment_experience_years: EXPERIENCE_OPTIONS[experience].to_string(),
        target_amount: target,
    };
    check(&profile)?;
    Ok(profile)
}

fn default_index<S: AsRef<str>>(options: &[S], wanted: Option<&str>, fallback: usize) -> usize {
    wanted
        .and_then(|w| options.iter().position(|o| o.as_ref() == w))
        .unwrap_or(fallback)
}

fn check(profile: &InvestorProfile) -> Result<()> {
    if !profile.total_investable_amount.is_finite() || profile.total_investable_amount <= 0.0 {
        bail!("investable amount must be positive");
    }
    if !profile.target_amount.is_finite() || profile.target_amount <= 0.0 {
        bail!("target amount must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_options() {
        let ages = age_options();
        assert_eq!(ages.len(), 17);
        assert_eq!(ages[0], "20-24 years");
        assert_eq!(ages[3], "35-39 years");
        assert_eq!(ages.last().unwrap(), "100-104 years");
    }

    #[test]
    fn test_defaults() {
        let profile = ProfileArgs::default().into_profile().unwrap();
        assert_eq!(profile.total_investable_amount, 50000.0);
        assert_eq!(profile.age, "35-39 years");
        assert_eq!(profile.stock_investment_experience_years, "5-10 years");
        assert_eq!(profile.target_amount, 70000.0);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let args = ProfileArgs {
            amount: Some(0.0),
            ..Default::default()
        };
        assert!(args.into_profile().is_err());
    }

    #[test]
    fn test_default_index() {
        assert_eq!(default_index(&EXPERIENCE_OPTIONS, Some("20+ years"), 3), 5);
        assert_eq!(default_index(&EXPERIENCE_OPTIONS, Some("forever"), 3), 3);
        assert_eq!(default_index(&EXPERIENCE_OPTIONS, None, 1), 1);
    }
}
