//! Line-oriented console presentation of a running session.

use perpsim_core::domain::ExitState;
use perpsim_core::ledger::{FlashTone, Ledger, LedgerEvent, PositionSummary};
use perpsim_runner::{TickObserver, TickUpdate};

/// Prints a status block per tick and a line per entry or exit.
pub struct ConsoleObserver {
    quiet: bool,
    ticks: u64,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, ticks: 0 }
    }

    /// Ticks seen so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl TickObserver for ConsoleObserver {
    fn on_tick(&mut self, update: &TickUpdate<'_>) {
        self.ticks = update.tick;
        if self.quiet {
            return;
        }
        let report = &update.outcome.report;
        println!();
        println!(
            "[{}] tick {} | Cash: ${:.2} | Allocated: ${:.2} | Net P/L: ${:+.2}",
            update.snapshot.taken_at.format("%Y-%m-%d %H:%M:%S"),
            update.tick,
            update.ledger.cash(),
            report.allocated(),
            report.unrealized_net(),
        );
        for summary in &report.summaries {
            println!("  {}", position_line(summary));
        }
        for symbol in &report.skipped {
            println!("  {symbol:<16} no price this tick");
        }
        for event in update.outcome.events() {
            print_flash(event);
        }
    }

    fn on_liquidation(&mut self, events: &[LedgerEvent], ledger: &Ledger) {
        if events.is_empty() {
            return;
        }
        if !self.quiet {
            for event in events {
                print_flash(event);
            }
        }
        println!(
            "Liquidated {} position(s). Cash: ${:.2}",
            events.len(),
            ledger.cash()
        );
    }
}

fn print_flash(event: &LedgerEvent) {
    let flash = event.flash();
    let marker = match flash.tone {
        FlashTone::Info => "*",
        FlashTone::Profit => "+",
        FlashTone::Loss => "-",
        FlashTone::Highlight => "$",
    };
    println!("  {marker} {}", flash.text);
}

fn position_line(s: &PositionSummary) -> String {
    let exits = match s.exit_state {
        ExitState::ActiveFixed => format!(
            "SL {:.2}% TP {}",
            s.stop_loss_pct * 100.0,
            pct_or_dash(s.take_profit_pct)
        ),
        ExitState::Breakeven => format!("SL entry TP {}", pct_or_dash(s.take_profit_pct)),
        ExitState::Trailing => format!("TRAIL {}", pct_or_dash(s.trailing_pct)),
    };
    format!(
        "{:<16} {:<5} {:<5} {:>3}x @ {:<12.4} PnL {:>+6.2}% ROE {:>+7.2}% | Net ${:>+9.2} | Fund ${:>+7.4} | {} | {:.2}h",
        s.symbol,
        s.direction.label(),
        s.trade_class.label(),
        s.leverage,
        s.price,
        s.pnl_pct * 100.0,
        s.roe_pct * 100.0,
        s.net_pnl,
        s.funding,
        exits,
        s.hours_held,
    )
}

fn pct_or_dash(pct: Option<f64>) -> String {
    pct.map(|p| format!("{:.2}%", p * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpsim_core::domain::{Direction, TradeClass};

    fn summary(exit_state: ExitState) -> PositionSummary {
        PositionSummary {
            symbol: "PF_SOLUSD".into(),
            direction: Direction::Long,
            trade_class: TradeClass::Scalp,
            leverage: 20,
            price: 101.5,
            roe_pct: 0.3,
            pnl_pct: 0.015,
            capital_used: 500.0,
            net_pnl: 148.2,
            funding: 0.0125,
            stop_loss_pct: 0.004,
            take_profit_pct: Some(0.01),
            trailing_pct: None,
            exit_state,
            hours_held: 1.25,
        }
    }

    #[test]
    fn fixed_line_shows_stop_and_target() {
        let line = position_line(&summary(ExitState::ActiveFixed));
        assert!(line.starts_with("PF_SOLUSD"));
        assert!(line.contains("PnL  +1.50% ROE  +30.00%"));
        assert!(line.contains("SL 0.40% TP 1.00%"));
        assert!(line.ends_with("1.25h"));
    }

    #[test]
    fn trailing_line_shows_offset() {
        let mut s = summary(ExitState::Trailing);
        s.take_profit_pct = None;
        s.trailing_pct = Some(0.003);
        assert!(position_line(&s).contains("TRAIL 0.30%"));
    }

    #[test]
    fn missing_percentage_renders_dash() {
        assert_eq!(pct_or_dash(None), "-");
        assert_eq!(pct_or_dash(Some(0.018)), "1.80%");
    }
}
