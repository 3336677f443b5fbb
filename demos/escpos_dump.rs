use std::env;
use std::io::Write;
use thermal_raster::{
    Alignment, Column, Config, EscPosSink, Printer, SymbolSpec, Symbology, TextStyle,
    MAX_PRINTER_WIDTH,
};
//
// cargo run --example escpos_dump [image] > receipt.bin
//
// Renders a small receipt as ESC/POS on stdout. Pipe it to a printer
// device, e.g. `cat receipt.bin > /dev/usb/lp0`.
//

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = Config::new();

    let mut printer = Printer::new(config.clone());
    printer.bind();
    printer.on_connected(EscPosSink::new(std::io::stdout(), config));

    printer.init_printer().unwrap();
    printer.set_alignment(Alignment::Center).unwrap();

    if args.len() > 1 {
        let bytes = std::fs::read(&args[1]).unwrap();
        match printer.print_bitmap(&bytes, MAX_PRINTER_WIDTH, 600) {
            Ok(()) => {}
            Err(err) => eprintln!("ERROR {}", err),
        }
    }

    printer
        .print_text_with_style("RECEIPT\n", TextStyle::BOLD)
        .unwrap();
    printer.set_alignment(Alignment::Left).unwrap();
    for (item, qty, price) in [("Green tea latte", "x1", "4.50"), ("奶茶", "x2", "12.00")] {
        printer
            .print_text_table(&[
                Column::new(item, 2, Alignment::Left),
                Column::new(qty, 1, Alignment::Center),
                Column::new(price, 1, Alignment::Right),
            ])
            .unwrap();
    }
    printer.set_alignment(Alignment::Center).unwrap();
    printer.print_text("Thank you for shopping\n").unwrap();

    let barcode = SymbolSpec::new("5901234123457", Symbology::Ean13, 300, 100);
    let qr = SymbolSpec::new("https://example.com", Symbology::Qr, 240, 240);
    for spec in [barcode, qr] {
        match printer.print_symbol(&spec) {
            Ok(()) => {}
            Err(err) => eprintln!("ERROR {:#?}", err),
        }
    }

    printer.feed_paper().unwrap();
    if let Some(sink) = printer.unbind() {
        sink.into_inner().flush().unwrap();
    }
}
